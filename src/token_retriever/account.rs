use std::fmt;

use http::{Request, Response};
use tracing::debug;

use crate::{
    TokenRetriever, TokenRetrieverError, credentials::AccountCredentialsSettings,
    http_client::HttpClient, settings::TokenProviderSettings, token::Token,
};

use super::{build_form_request, decode_token};

/// HTTP-based token retriever for account credentials (password grant).
pub struct AccountTokenRetriever<C: HttpClient> {
    credentials: AccountCredentialsSettings,
    http_client: C,
    settings: TokenProviderSettings,
}

impl<C: HttpClient> fmt::Debug for AccountTokenRetriever<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AccountTokenRetriever")
            .field("credentials", &self.credentials)
            .field("settings", &self.settings)
            .field("http_client", &"impl HttpClient")
            .finish()
    }
}

impl<C: HttpClient> AccountTokenRetriever<C> {
    pub fn new(
        credentials: AccountCredentialsSettings,
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

impl<C: HttpClient> TokenRetriever for AccountTokenRetriever<C> {
    fn retrieve(&self) -> Result<Token, TokenRetrieverError> {
        let request = build_request(&self.credentials, &self.settings)?;

        debug!(username = %self.credentials.username, "requesting account token");
        let response = self.http_client.send(request)?;

        evaluate_response(response, &self.settings)
    }
}

fn build_request(
    credentials: &AccountCredentialsSettings,
    settings: &TokenProviderSettings,
) -> Result<Request<Vec<u8>>, TokenRetrieverError> {
    build_form_request(
        &settings.token_url,
        &[
            ("grant_type", "password"),
            ("username", &credentials.username),
            ("password", &credentials.password),
        ],
        None,
    )
}

fn evaluate_response(
    res: Response<Vec<u8>>,
    settings: &TokenProviderSettings,
) -> Result<Token, TokenRetrieverError> {
    if !res.status().is_success() {
        debug!(status = res.status().as_u16(), "token endpoint rejected account credentials");
        return Err(TokenRetrieverError::WrongCredentials);
    }
    decode_token(&res, settings)
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use assert_matches::assert_matches;
    use chrono::{TimeDelta, Utc};
    use http::{Method, Uri, header::CONTENT_TYPE};
    use httpmock::{Method::POST, MockServer};
    use rstest::rstest;

    use crate::http::client::HttpClient as ReqwestHttpClient;
    use crate::http_client::HttpClientError;
    use crate::http_client::tests::{MockHttpClient, response};

    use super::*;

    fn credentials() -> AccountCredentialsSettings {
        AccountCredentialsSettings {
            username: "user@up42.com".to_string(),
            password: "p&ss word".to_string(),
        }
    }

    fn settings(uri: Uri) -> TokenProviderSettings {
        TokenProviderSettings::new(uri).with_expiry_offset(Duration::from_secs(1))
    }

    #[test]
    fn build_correct_requests() {
        let uri = Uri::from_static("https://auth.example.com/token");

        let request = build_request(&credentials(), &settings(uri.clone())).unwrap();

        assert_eq!(request.method(), Method::POST);
        assert_eq!(request.uri(), &uri);
        assert_eq!(
            request.headers().get(CONTENT_TYPE).unwrap(),
            "application/x-www-form-urlencoded"
        );
        assert_eq!(
            String::from_utf8(request.body().clone()).unwrap(),
            "grant_type=password&username=user%40up42.com&password=p%26ss+word"
        );
    }

    #[test]
    fn retrieve_token_against_token_endpoint() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(POST)
                .path("/token")
                .header("content-type", "application/x-www-form-urlencoded")
                .body("grant_type=password&username=user%40up42.com&password=p%26ss+word");
            then.status(200)
                .json_body(serde_json::json!({"access_token": "tok", "expires_in": 3}));
        });

        let http_client = ReqwestHttpClient::new(Duration::from_secs(5)).unwrap();
        let retriever = AccountTokenRetriever::new(
            credentials(),
            http_client,
            settings(server.url("/token").parse().unwrap()),
        );

        let before = Utc::now();
        let token = retriever.retrieve().unwrap();
        let after = Utc::now();

        assert_eq!(token.access_token(), "tok");
        // 3 seconds of lifetime minus 1 second of expiry offset
        assert!(token.expires_on() >= before + TimeDelta::seconds(2));
        assert!(token.expires_on() <= after + TimeDelta::seconds(2));
        mock.assert();
    }

    #[rstest]
    #[case(400)]
    #[case(401)]
    #[case(403)]
    #[case(404)]
    #[case(429)]
    #[case(500)]
    #[case(503)]
    #[case(599)]
    fn rejected_credentials(#[case] status: u16) {
        let mut http_client = MockHttpClient::new();
        http_client
            .expect_send()
            .once()
            .returning(move |_| Ok(response(status, "")));

        let retriever = AccountTokenRetriever::new(
            credentials(),
            http_client,
            settings(Uri::from_static("https://auth.example.com/token")),
        );

        assert_matches!(retriever.retrieve(), Err(TokenRetrieverError::WrongCredentials));
    }

    #[test]
    fn transport_errors_are_propagated() {
        let mut http_client = MockHttpClient::new();
        http_client.expect_send().once().returning(|_| {
            Err(HttpClientError::TransportError(
                "Connection refused".to_string(),
            ))
        });

        let retriever = AccountTokenRetriever::new(
            credentials(),
            http_client,
            settings(Uri::from_static("https://auth.example.com/token")),
        );

        assert_matches!(
            retriever.retrieve(),
            Err(TokenRetrieverError::Http(HttpClientError::TransportError(_)))
        );
    }

    #[test]
    fn debug_hides_password() {
        let retriever = AccountTokenRetriever::new(
            credentials(),
            MockHttpClient::new(),
            settings(Uri::from_static("https://auth.example.com/token")),
        );
        assert!(!format!("{retriever:?}").contains("p&ss word"));
    }
}
