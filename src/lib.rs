pub mod authenticator;
pub mod client;
pub mod commands;
pub mod config_file;
pub mod credentials;
pub mod http;
pub mod http_client;
pub mod parameters;
pub mod session;
pub mod settings;
pub mod token;
pub mod token_retriever;

use crate::http_client::HttpClientError;
use crate::token::Token;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum TokenRetrieverError {
    #[error("retrieving token: `{0}`")]
    TokenRetrieverError(String),
    /// The token endpoint rejected the account username and password.
    #[error("wrong credentials: the token endpoint rejected the username or password")]
    WrongCredentials,
    #[error("requesting token: `{0}`")]
    Http(#[from] HttpClientError),
    #[error("acquiring cache mutex lock")]
    PoisonError,
}

/// The TokenRetriever will be the responsible to exchange a set of credentials for a token.
///
/// Every call performs exactly one POST against the token endpoint it was built with.
pub trait TokenRetriever {
    fn retrieve(&self) -> Result<Token, TokenRetrieverError>;
}
