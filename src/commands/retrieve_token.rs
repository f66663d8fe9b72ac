use crate::client::{ClientError, ClientFactory, ClientOptions};
use crate::commands::CommandError;
use crate::http_client::HttpClient;
use crate::token::Token;

pub struct RetrieveTokenCommand<C> {
    factory: ClientFactory,
    http_client: C,
}

impl<C> RetrieveTokenCommand<C>
where
    C: HttpClient + Clone,
{
    pub fn new(factory: ClientFactory, http_client: C) -> Self {
        Self {
            factory,
            http_client,
        }
    }

    /// Authenticates with the single credential source found in `options` and returns its token.
    pub fn retrieve_token(self, options: ClientOptions) -> Result<Token, CommandError> {
        let client = self
            .factory
            .create_with_http_client(options, self.http_client)?;
        let token = client
            .session()
            .authenticator()
            .token()
            .map_err(ClientError::from)?;
        Ok(token)
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;
    use http::{Request, Response};

    use crate::TokenRetrieverError;
    use crate::credentials::CredentialsError;
    use crate::http_client::HttpClientError;
    use crate::http_client::tests::response;
    use crate::settings::{Environment, ResilienceSettings};

    use super::*;

    fn factory() -> ClientFactory {
        ClientFactory::new(Environment::Staging)
            .with_resilience(ResilienceSettings::default().with_total_retries(0))
    }

    #[test]
    fn test_retrieve_token_with_account_success() {
        let http_client = |req: Request<Vec<u8>>| -> Result<Response<Vec<u8>>, HttpClientError> {
            assert_eq!(
                req.uri(),
                "https://auth.up42.dev/realms/public/protocol/openid-connect/token"
            );
            Ok(response(
                200,
                r#"{"access_token":"retrieved_account_token","expires_in":300}"#,
            ))
        };
        let command = RetrieveTokenCommand::new(factory(), http_client);

        let token = command
            .retrieve_token(ClientOptions::default().with_account("user", "secret"))
            .unwrap();

        assert_eq!(token.access_token(), "retrieved_account_token");
        assert!(!token.is_expired());
    }

    #[test]
    fn test_retrieve_token_with_project_success() {
        let http_client = |req: Request<Vec<u8>>| -> Result<Response<Vec<u8>>, HttpClientError> {
            assert!(req.headers().contains_key(http::header::AUTHORIZATION));
            Ok(response(200, r#"{"access_token":"retrieved_project_token"}"#))
        };
        let command = RetrieveTokenCommand::new(factory(), http_client);

        let token = command
            .retrieve_token(ClientOptions::default().with_project("id", "key"))
            .unwrap();

        assert_eq!(token.access_token(), "retrieved_project_token");
    }

    #[test]
    fn test_retrieve_token_fails_without_credentials() {
        let http_client = |_req: Request<Vec<u8>>| -> Result<Response<Vec<u8>>, HttpClientError> {
            panic!("no request expected without credentials")
        };
        let command = RetrieveTokenCommand::new(factory(), http_client);

        assert_matches!(
            command.retrieve_token(ClientOptions::default()),
            Err(CommandError::Client(ClientError::Credentials(
                CredentialsError::MissingCredentials
            )))
        );
    }

    #[test]
    fn test_retrieve_token_fails_on_http_error() {
        let http_client = |_req: Request<Vec<u8>>| -> Result<Response<Vec<u8>>, HttpClientError> {
            Err(HttpClientError::TransportError(
                "Connection refused".to_string(),
            ))
        };
        let command = RetrieveTokenCommand::new(factory(), http_client);

        let result = command.retrieve_token(ClientOptions::default().with_account("user", "secret"));

        assert_matches!(
            &result,
            Err(CommandError::Client(ClientError::Authentication(TokenRetrieverError::Http(_))))
        );
        assert!(result.unwrap_err().to_string().contains("Connection refused"));
    }
}
