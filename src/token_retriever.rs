//! Token retrievers, one per supported grant.

pub mod account;
pub mod http_impl;
pub mod project;

use http::header::CONTENT_TYPE;
use http::{HeaderValue, Request, Response, Uri};

use crate::TokenRetrieverError;
use crate::settings::TokenProviderSettings;
use crate::token::{Token, TokenRetrievalResponse};

pub use account::AccountTokenRetriever;
pub use http_impl::HttpTokenRetriever;
pub use project::ProjectTokenRetriever;

const FORM_CONTENT_TYPE: &str = "application/x-www-form-urlencoded";

/// Builds the form-encoded POST every grant sends to the token endpoint.
fn build_form_request(
    uri: &Uri,
    form: &[(&str, &str)],
    authorization: Option<HeaderValue>,
) -> Result<Request<Vec<u8>>, TokenRetrieverError> {
    let body = url::form_urlencoded::Serializer::new(String::new())
        .extend_pairs(form)
        .finish();

    let mut builder = Request::builder()
        .uri(uri)
        .method("POST")
        .header(CONTENT_TYPE, FORM_CONTENT_TYPE);
    if let Some(authorization) = authorization {
        builder = builder.header(http::header::AUTHORIZATION, authorization);
    }

    builder.body(body.into_bytes()).map_err(|e| {
        TokenRetrieverError::TokenRetrieverError(format!("Failed to build request: {e}"))
    })
}

/// Decodes a successful token endpoint response into a [`Token`].
fn decode_token(
    response: &Response<Vec<u8>>,
    settings: &TokenProviderSettings,
) -> Result<Token, TokenRetrieverError> {
    let decoded: TokenRetrievalResponse =
        serde_json::from_slice(response.body()).map_err(|e| {
            TokenRetrieverError::TokenRetrieverError(format!(
                "Failed to decode JSON response: {e}"
            ))
        })?;

    Token::from_response(decoded, settings.duration, settings.expiry_offset)
}
