//! Construction of authenticated UP42 clients.
//!
//! [`ClientFactory::create`] resolves exactly one credential source, fetches the first token and
//! hands back a [`Client`] whose session authenticates every request. Any failure along the way
//! aborts the construction; there is no half-authenticated client.

use std::path::PathBuf;

use http::Uri;
use tracing::debug;

use crate::TokenRetrieverError;
use crate::authenticator::BearerAuthenticator;
use crate::config_file::{ConfigFileError, read_config_file};
use crate::credentials::{self, CredentialsError};
use crate::http::client::{HttpBuildError, HttpClient as ReqwestHttpClient};
use crate::http::retry::RetryingHttpClient;
use crate::http_client::HttpClient;
use crate::session::{Session, SessionFactory};
use crate::settings::{Environment, ResilienceSettings, TokenProviderSettings};
use crate::token::AccessToken;
use crate::token_retriever::HttpTokenRetriever;

#[derive(thiserror::Error, Debug)]
pub enum ClientError {
    #[error(transparent)]
    ConfigFile(#[from] ConfigFileError),
    #[error(transparent)]
    Credentials(#[from] CredentialsError),
    #[error("authenticating client: `{0}`")]
    Authentication(#[from] TokenRetrieverError),
    #[error(transparent)]
    HttpBuild(#[from] HttpBuildError),
    #[error("invalid endpoint: `{0}`")]
    InvalidEndpoint(String),
}

/// The credential sources a client can be built from. At most one of them may be complete.
#[derive(Default, Clone)]
pub struct ClientOptions {
    pub cfg_file: Option<PathBuf>,
    pub project_id: Option<String>,
    pub project_api_key: Option<String>,
    pub username: Option<String>,
    pub password: Option<String>,
}

impl ClientOptions {
    pub fn with_cfg_file(self, cfg_file: impl Into<PathBuf>) -> Self {
        Self {
            cfg_file: Some(cfg_file.into()),
            ..self
        }
    }

    pub fn with_project(self, project_id: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            project_id: Some(project_id.into()),
            project_api_key: Some(api_key.into()),
            ..self
        }
    }

    pub fn with_account(self, username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: Some(username.into()),
            password: Some(password.into()),
            ..self
        }
    }
}

impl std::fmt::Debug for ClientOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let hidden = |v: &Option<String>| v.as_ref().map(|_| "<hidden>");
        f.debug_struct("ClientOptions")
            .field("cfg_file", &self.cfg_file)
            .field("project_id", &self.project_id)
            .field("project_api_key", &hidden(&self.project_api_key))
            .field("username", &self.username)
            .field("password", &hidden(&self.password))
            .finish()
    }
}

pub type ClientSession<C> = Session<RetryingHttpClient<C>, HttpTokenRetriever<RetryingHttpClient<C>>>;

/// An authenticated client. It owns its session and token exclusively.
pub struct Client<C: HttpClient = ReqwestHttpClient> {
    environment: Environment,
    session: ClientSession<C>,
}

// No bounds on C: the session and transport need not be Debug.
impl<C: HttpClient> std::fmt::Debug for Client<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Client")
            .field("environment", &self.environment)
            .finish_non_exhaustive()
    }
}

impl<C: HttpClient> Client<C> {
    /// The current access token, refreshed first if it had expired.
    pub fn token(&self) -> Result<AccessToken, TokenRetrieverError> {
        self.session.authenticator().access_token()
    }

    pub fn session(&self) -> &ClientSession<C> {
        &self.session
    }

    pub fn environment(&self) -> &Environment {
        &self.environment
    }

    /// Absolute URI of an API path in the client's environment.
    pub fn endpoint(&self, path: &str) -> Result<Uri, ClientError> {
        self.environment
            .endpoint(path)
            .map_err(ClientError::InvalidEndpoint)
    }
}

#[derive(Debug, Clone, Default)]
pub struct ClientFactory {
    environment: Environment,
    resilience: ResilienceSettings,
    token_settings: Option<TokenProviderSettings>,
}

impl ClientFactory {
    pub fn new(environment: Environment) -> Self {
        Self {
            environment,
            ..Default::default()
        }
    }

    pub fn with_resilience(self, resilience: ResilienceSettings) -> Self {
        Self { resilience, ..self }
    }

    /// Overrides the token settings, token endpoint included, derived from the environment.
    pub fn with_token_settings(self, token_settings: TokenProviderSettings) -> Self {
        Self {
            token_settings: Some(token_settings),
            ..self
        }
    }

    pub fn token_settings(&self) -> TokenProviderSettings {
        self.token_settings
            .clone()
            .unwrap_or_else(|| TokenProviderSettings::new(self.environment.token_endpoint()))
    }

    /// Builds an authenticated client on top of a reqwest blocking client.
    pub fn create(&self, options: ClientOptions) -> Result<Client, ClientError> {
        let http_client = ReqwestHttpClient::new(self.token_settings().timeout)?;
        self.create_with_http_client(options, http_client)
    }

    /// Builds an authenticated client on top of `http_client`.
    ///
    /// The token endpoint is reached through a copy of `http_client` that also retries POST;
    /// business calls go through one that does not.
    pub fn create_with_http_client<C>(
        &self,
        options: ClientOptions,
        http_client: C,
    ) -> Result<Client<C>, ClientError>
    where
        C: HttpClient + Clone,
    {
        let config = read_config_file(options.cfg_file.as_deref())?;
        let credentials = credentials::resolve([
            config,
            credentials::project_source(options.project_id, options.project_api_key),
            credentials::account_source(options.username, options.password),
        ])?;

        let token_settings = self.token_settings();
        debug!(token_url = %token_settings.token_url, "authenticating client");
        let token_client = RetryingHttpClient::create(http_client.clone(), &self.resilience, true);
        let retriever = HttpTokenRetriever::new(token_client, credentials, token_settings);
        let authenticator = BearerAuthenticator::new(retriever)?;

        Ok(Client {
            environment: self.environment.clone(),
            session: SessionFactory::create(authenticator, http_client, &self.resilience),
        })
    }
}
