use std::fmt;

use base64::{Engine, engine::general_purpose};
use http::{HeaderValue, Request, Response};
use tracing::debug;

use crate::{
    TokenRetriever, TokenRetrieverError,
    credentials::ProjectCredentialsSettings,
    http_client::{HttpClient, HttpClientError},
    settings::TokenProviderSettings,
    token::Token,
};

use super::{build_form_request, decode_token};

/// HTTP-based token retriever for project credentials (client credentials grant).
///
/// The project id and API key travel as HTTP Basic credentials.
pub struct ProjectTokenRetriever<C: HttpClient> {
    credentials: ProjectCredentialsSettings,
    http_client: C,
    settings: TokenProviderSettings,
}

impl<C: HttpClient> fmt::Debug for ProjectTokenRetriever<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProjectTokenRetriever")
            .field("credentials", &self.credentials)
            .field("settings", &self.settings)
            .field("http_client", &"impl HttpClient") // HttpClient does not implement Debug
            .finish()
    }
}

impl<C: HttpClient> ProjectTokenRetriever<C> {
    pub fn new(
        credentials: ProjectCredentialsSettings,
        http_client: C,
        settings: TokenProviderSettings,
    ) -> Self {
        Self {
            credentials,
            http_client,
            settings,
        }
    }
}

impl<C: HttpClient> TokenRetriever for ProjectTokenRetriever<C> {
    fn retrieve(&self) -> Result<Token, TokenRetrieverError> {
        let request = build_request(&self.credentials, &self.settings)?;

        debug!(project_id = %self.credentials.project_id, "requesting project token");
        let response = self.http_client.send(request)?;

        evaluate_response(response, &self.settings)
    }
}

fn build_request(
    credentials: &ProjectCredentialsSettings,
    settings: &TokenProviderSettings,
) -> Result<Request<Vec<u8>>, TokenRetrieverError> {
    let basic = general_purpose::STANDARD.encode(format!(
        "{}:{}",
        credentials.project_id, credentials.project_api_key
    ));
    let mut authorization = HeaderValue::from_str(&format!("Basic {basic}")).map_err(|_| {
        TokenRetrieverError::TokenRetrieverError(
            "invalid HTTP header value set for Authorization".to_string(),
        )
    })?;
    authorization.set_sensitive(true);

    build_form_request(
        &settings.token_url,
        &[("grant_type", "client_credentials")],
        Some(authorization),
    )
}

fn evaluate_response(
    res: Response<Vec<u8>>,
    settings: &TokenProviderSettings,
) -> Result<Token, TokenRetrieverError> {
    if !res.status().is_success() {
        return Err(HttpClientError::UnsuccessfulResponse(
            res.status().as_u16(),
            String::from_utf8_lossy(res.body()).to_string(),
        )
        .into());
    }
    decode_token(&res, settings)
}
