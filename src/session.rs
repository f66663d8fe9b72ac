//! Authenticated HTTP sessions.
//!
//! A [`Session`] authenticates every request with its [`BearerAuthenticator`], sends it through
//! the retrying transport and turns error statuses into errors unless the caller opts out for
//! that call.

use http::header::{CONTENT_TYPE, HeaderName};
use http::{HeaderValue, Method, Request, Response, Uri};
use serde::Serialize;
use tracing::debug;

use crate::authenticator::BearerAuthenticator;
use crate::http::retry::RetryingHttpClient;
use crate::http_client::{HttpClient, HttpClientError};
use crate::settings::ResilienceSettings;
use crate::{TokenRetriever, TokenRetrieverError};

#[derive(thiserror::Error, Debug)]
pub enum SessionError {
    #[error("authenticating request: `{0}`")]
    Authentication(#[from] TokenRetrieverError),
    #[error("{0}")]
    Http(#[from] HttpClientError),
}

impl SessionError {
    /// Status of the response that caused the error, if there was one.
    pub fn status(&self) -> Option<u16> {
        match self {
            SessionError::Http(HttpClientError::UnsuccessfulResponse(status, _)) => Some(*status),
            _ => None,
        }
    }
}

pub struct Session<C, R> {
    http_client: C,
    authenticator: BearerAuthenticator<R>,
}

/// Builds sessions whose transport retries transient failures of idempotent methods.
pub struct SessionFactory;

impl SessionFactory {
    /// Mounts the retry policy on `http_client` and installs `authenticator` as the auth hook.
    ///
    /// POST is left out of the retried methods: business calls are not assumed idempotent.
    pub fn create<C, R>(
        authenticator: BearerAuthenticator<R>,
        http_client: C,
        settings: &ResilienceSettings,
    ) -> Session<RetryingHttpClient<C>, R>
    where
        C: HttpClient,
        R: TokenRetriever,
    {
        Session::new(
            RetryingHttpClient::create(http_client, settings, false),
            authenticator,
        )
    }
}

impl<C, R> Session<C, R>
where
    C: HttpClient,
    R: TokenRetriever,
{
    pub fn new(http_client: C, authenticator: BearerAuthenticator<R>) -> Self {
        Self {
            http_client,
            authenticator,
        }
    }

    pub fn authenticator(&self) -> &BearerAuthenticator<R> {
        &self.authenticator
    }

    /// Sends an authenticated request and fails on any 4xx or 5xx response.
    pub fn send(&self, request: Request<Vec<u8>>) -> Result<Response<Vec<u8>>, SessionError> {
        let response = self.send_unchecked(request)?;
        error_for_status(response)
    }

    /// Sends an authenticated request and returns the response whatever its status.
    pub fn send_unchecked(
        &self,
        request: Request<Vec<u8>>,
    ) -> Result<Response<Vec<u8>>, SessionError> {
        let request = self.authenticator.authenticate(request)?;
        debug!(method = %request.method(), uri = %request.uri(), "sending request");
        Ok(self.http_client.send(request)?)
    }

    pub fn request(&self, method: Method, uri: Uri) -> SessionRequest<'_, C, R> {
        SessionRequest {
            session: self,
            builder: Request::builder().method(method).uri(uri),
            body: Vec::new(),
            error_for_status: true,
        }
    }

    pub fn get(&self, uri: Uri) -> SessionRequest<'_, C, R> {
        self.request(Method::GET, uri)
    }

    pub fn post(&self, uri: Uri) -> SessionRequest<'_, C, R> {
        self.request(Method::POST, uri)
    }

    pub fn put(&self, uri: Uri) -> SessionRequest<'_, C, R> {
        self.request(Method::PUT, uri)
    }

    pub fn patch(&self, uri: Uri) -> SessionRequest<'_, C, R> {
        self.request(Method::PATCH, uri)
    }

    pub fn delete(&self, uri: Uri) -> SessionRequest<'_, C, R> {
        self.request(Method::DELETE, uri)
    }
}

fn error_for_status(response: Response<Vec<u8>>) -> Result<Response<Vec<u8>>, SessionError> {
    let status = response.status();
    if status.is_client_error() || status.is_server_error() {
        return Err(HttpClientError::UnsuccessfulResponse(
            status.as_u16(),
            String::from_utf8_lossy(response.body()).to_string(),
        )
        .into());
    }
    Ok(response)
}

/// A request being assembled against a [`Session`].
pub struct SessionRequest<'a, C, R> {
    session: &'a Session<C, R>,
    builder: http::request::Builder,
    body: Vec<u8>,
    error_for_status: bool,
}

impl<C, R> SessionRequest<'_, C, R>
where
    C: HttpClient,
    R: TokenRetriever,
{
    pub fn header<K, V>(self, key: K, value: V) -> Self
    where
        K: TryInto<HeaderName>,
        <K as TryInto<HeaderName>>::Error: Into<http::Error>,
        V: TryInto<HeaderValue>,
        <V as TryInto<HeaderValue>>::Error: Into<http::Error>,
    {
        Self {
            builder: self.builder.header(key, value),
            ..self
        }
    }

    pub fn body(self, body: Vec<u8>) -> Self {
        Self { body, ..self }
    }

    /// Serializes `value` as the JSON body of the request.
    pub fn json<T: Serialize + ?Sized>(self, value: &T) -> Result<Self, SessionError> {
        let body = serde_json::to_vec(value)
            .map_err(|e| HttpClientError::EncoderError(e.to_string()))?;
        Ok(Self {
            builder: self.builder.header(CONTENT_TYPE, "application/json"),
            body,
            ..self
        })
    }

    /// Opts this call out of failing on 4xx and 5xx responses.
    pub fn allow_error_status(self) -> Self {
        Self {
            error_for_status: false,
            ..self
        }
    }

    pub fn send(self) -> Result<Response<Vec<u8>>, SessionError> {
        let request = self
            .builder
            .body(self.body)
            .map_err(|e| HttpClientError::EncoderError(e.to_string()))?;

        if self.error_for_status {
            self.session.send(request)
        } else {
            self.session.send_unchecked(request)
        }
    }
}
