use crate::http_client::{HttpClient as Up42HttpClient, HttpClientError as Up42HttpClientError};
use http::Response as HttpResponse;
use http::{Request, Response};
use reqwest::blocking::{Client, Response as BlockingResponse};
use std::time::Duration;

/// Reqwest blocking client implementing the crate's [`HttpClient`](Up42HttpClient) trait.
#[derive(Debug, Clone)]
pub struct HttpClient {
    client: Client,
}

impl HttpClient {
    /// Builds a reqwest blocking client whose requests and connections give up after `timeout`.
    pub fn new(timeout: Duration) -> Result<Self, HttpBuildError> {
        let builder = Client::builder()
            .use_rustls_tls()
            .tls_built_in_native_certs(true)
            .timeout(timeout)
            .connect_timeout(timeout);

        let client = builder
            .build()
            .map_err(|err| HttpBuildError::ClientBuilder(err.to_string()))?;

        Ok(Self { client })
    }

    fn send(&self, request: Request<Vec<u8>>) -> Result<HttpResponse<Vec<u8>>, HttpResponseError> {
        let (parts, body) = request.into_parts();
        let req = self
            .client
            .request(parts.method, parts.uri.to_string().as_str())
            .headers(parts.headers)
            .body(body);

        let res = req
            .send()
            .map_err(|err| HttpResponseError::TransportError(err.to_string()))?;

        try_build_response(res)
    }
}

/// Helper to build a [HttpResponse<Vec<u8>>] from a reqwest's blocking response.
/// It includes status, version, headers and body.
fn try_build_response(res: BlockingResponse) -> Result<HttpResponse<Vec<u8>>, HttpResponseError> {
    let status = res.status();
    let version = res.version();
    let headers = res.headers().clone();

    let body: Vec<u8> = res
        .bytes()
        .map_err(|err| HttpResponseError::ReadingResponse(err.to_string()))?
        .into();

    let mut response_builder = http::Response::builder().status(status).version(version);
    if let Some(response_headers) = response_builder.headers_mut() {
        response_headers.extend(headers);
    }

    let response = response_builder
        .body(body)
        .map_err(|err| HttpResponseError::BuildingResponse(err.to_string()))?;

    Ok(response)
}

impl Up42HttpClient for HttpClient {
    fn send(&self, req: Request<Vec<u8>>) -> Result<Response<Vec<u8>>, Up42HttpClientError> {
        let response = self.send(req)?;

        Ok(response)
    }
}

impl From<HttpResponseError> for Up42HttpClientError {
    fn from(err: HttpResponseError) -> Self {
        match err {
            HttpResponseError::TransportError(msg) => Up42HttpClientError::TransportError(msg),
            HttpResponseError::BuildingResponse(msg) | HttpResponseError::ReadingResponse(msg) => {
                Up42HttpClientError::InvalidResponse(msg)
            }
        }
    }
}

#[derive(thiserror::Error, Debug)]
pub enum HttpBuildError {
    #[error("could not build the http client: {0}")]
    ClientBuilder(String),
}

#[derive(thiserror::Error, Debug)]
enum HttpResponseError {
    #[error("could read response body: {0}")]
    ReadingResponse(String),
    #[error("could build response: {0}")]
    BuildingResponse(String),
    #[error("http transport error: `{0}`")]
    TransportError(String),
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;
    use httpmock::{Method::GET, MockServer};

    use super::*;

    #[test]
    fn sends_request_and_keeps_response_headers() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(GET).path("/v2/assets").header("x-custom", "value");
            then.status(200).header("retry-after", "3").body("payload");
        });

        let client = HttpClient::new(Duration::from_secs(5)).unwrap();
        let request = Request::builder()
            .method("GET")
            .uri(server.url("/v2/assets"))
            .header("x-custom", "value")
            .body(Vec::new())
            .unwrap();

        let response = Up42HttpClient::send(&client, request).unwrap();

        assert_eq!(response.status(), 200);
        assert_eq!(response.headers().get("retry-after").unwrap(), "3");
        assert_eq!(response.body(), b"payload");
        mock.assert();
    }

    #[test]
    fn error_statuses_are_returned_as_responses() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET).path("/missing");
            then.status(404);
        });

        let client = HttpClient::new(Duration::from_secs(5)).unwrap();
        let request = Request::builder()
            .uri(server.url("/missing"))
            .body(Vec::new())
            .unwrap();

        let response = Up42HttpClient::send(&client, request).unwrap();

        assert_eq!(response.status(), 404);
    }

    #[test]
    fn timeout_is_a_transport_error() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET).path("/slow");
            then.status(200).delay(Duration::from_millis(200));
        });

        let client = HttpClient::new(Duration::from_millis(20)).unwrap();
        let request = Request::builder()
            .uri(server.url("/slow"))
            .body(Vec::new())
            .unwrap();

        assert_matches!(
            Up42HttpClient::send(&client, request),
            Err(Up42HttpClientError::TransportError(_))
        );
    }
}
