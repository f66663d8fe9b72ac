use http::{Method, Response};

use crate::client::{ClientFactory, ClientOptions};
use crate::commands::CommandError;
use crate::http_client::HttpClient;

/// What to send: the method, the API path relative to the environment, and an optional JSON body.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct RequestInput {
    pub method: String,
    pub path: String,
    pub body: Option<String>,
    pub allow_error_status: bool,
}

pub struct RequestCommand<C> {
    factory: ClientFactory,
    http_client: C,
}

impl<C> RequestCommand<C>
where
    C: HttpClient + Clone,
{
    pub fn new(factory: ClientFactory, http_client: C) -> Self {
        Self {
            factory,
            http_client,
        }
    }

    /// Builds an authenticated client and performs one request with it.
    pub fn request(
        self,
        options: ClientOptions,
        input: &RequestInput,
    ) -> Result<Response<Vec<u8>>, CommandError> {
        let method = Method::from_bytes(input.method.to_uppercase().as_bytes())
            .map_err(|e| CommandError::InvalidRequest(format!("method `{}`: {e}", input.method)))?;
        let body = input
            .body
            .as_deref()
            .map(serde_json::from_str::<serde_json::Value>)
            .transpose()
            .map_err(|e| CommandError::InvalidRequest(format!("body is not valid JSON: {e}")))?;

        let client = self
            .factory
            .create_with_http_client(options, self.http_client)?;
        let uri = client.endpoint(&input.path)?;

        let mut request = client.session().request(method, uri);
        if let Some(body) = body {
            request = request.json(&body)?;
        }
        if input.allow_error_status {
            request = request.allow_error_status();
        }
        Ok(request.send()?)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use assert_matches::assert_matches;
    use http::Request;
    use http::header::AUTHORIZATION;

    use crate::http_client::HttpClientError;
    use crate::http_client::tests::response;
    use crate::settings::{Environment, ResilienceSettings};

    use super::*;

    type Recorded = Arc<Mutex<Vec<Request<Vec<u8>>>>>;

    /// Answers the token endpoint with a token and every other call with `status`.
    fn fake_api(
        recorded: Recorded,
        status: u16,
    ) -> impl Fn(Request<Vec<u8>>) -> Result<Response<Vec<u8>>, HttpClientError> + Clone {
        move |req| {
            if req.uri().path().ends_with("/token") {
                return Ok(response(200, r#"{"access_token":"api-token"}"#));
            }
            recorded.lock().unwrap().push(req);
            Ok(response(status, r#"{"data":[]}"#))
        }
    }

    fn factory() -> ClientFactory {
        ClientFactory::new(Environment::Production)
            .with_resilience(ResilienceSettings::default().with_total_retries(0))
    }

    fn options() -> ClientOptions {
        ClientOptions::default().with_account("user", "secret")
    }

    #[test]
    fn get_request_is_authenticated() {
        let recorded = Recorded::default();
        let command = RequestCommand::new(factory(), fake_api(recorded.clone(), 200));

        let response = command
            .request(
                options(),
                &RequestInput {
                    method: "get".to_string(),
                    path: "/v2/assets".to_string(),
                    ..Default::default()
                },
            )
            .unwrap();

        assert_eq!(response.body(), br#"{"data":[]}"#);
        let sent = recorded.lock().unwrap();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].method(), Method::GET);
        assert_eq!(sent[0].uri(), "https://api.up42.com/v2/assets");
        assert_eq!(sent[0].headers()[AUTHORIZATION], "Bearer api-token");
    }

    #[test]
    fn post_request_carries_json_body() {
        let recorded = Recorded::default();
        let command = RequestCommand::new(factory(), fake_api(recorded.clone(), 201));

        command
            .request(
                options(),
                &RequestInput {
                    method: "POST".to_string(),
                    path: "v2/orders".to_string(),
                    body: Some(r#"{"name": "order"}"#.to_string()),
                    allow_error_status: false,
                },
            )
            .unwrap();

        let sent = recorded.lock().unwrap();
        assert_eq!(sent[0].method(), Method::POST);
        assert_eq!(sent[0].body().as_slice(), br#"{"name":"order"}"#);
    }

    #[test]
    fn error_status_fails_unless_allowed() {
        let recorded = Recorded::default();
        let input = RequestInput {
            method: "GET".to_string(),
            path: "/v2/missing".to_string(),
            ..Default::default()
        };

        let result =
            RequestCommand::new(factory(), fake_api(recorded.clone(), 404)).request(options(), &input);
        assert_matches!(result, Err(CommandError::Session(err)) => {
            assert_eq!(err.status(), Some(404));
        });

        let allowed = RequestInput {
            allow_error_status: true,
            ..input
        };
        let response = RequestCommand::new(factory(), fake_api(recorded, 404))
            .request(options(), &allowed)
            .unwrap();
        assert_eq!(response.status(), 404);
    }

    #[test]
    fn invalid_body_is_rejected_before_authenticating() {
        let http_client = |_req: Request<Vec<u8>>| -> Result<Response<Vec<u8>>, HttpClientError> {
            panic!("no request expected for an invalid body")
        };

        let result = RequestCommand::new(factory(), http_client).request(
            options(),
            &RequestInput {
                method: "POST".to_string(),
                path: "/v2/orders".to_string(),
                body: Some("{not json".to_string()),
                allow_error_status: false,
            },
        );

        assert_matches!(result, Err(CommandError::InvalidRequest(_)));
    }

    #[test]
    fn invalid_method_is_rejected() {
        let http_client = |_req: Request<Vec<u8>>| -> Result<Response<Vec<u8>>, HttpClientError> {
            panic!("no request expected for an invalid method")
        };

        let result = RequestCommand::new(factory(), http_client).request(
            options(),
            &RequestInput {
                method: "GE T".to_string(),
                path: "/v2/assets".to_string(),
                ..Default::default()
            },
        );

        assert_matches!(result, Err(CommandError::InvalidRequest(_)));
    }
}
