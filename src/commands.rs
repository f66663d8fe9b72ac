pub mod request;
pub mod retrieve_token;

use crate::client::ClientError;
use crate::session::SessionError;

#[derive(thiserror::Error, Debug)]
pub enum CommandError {
    #[error(transparent)]
    Client(#[from] ClientError),
    #[error(transparent)]
    Session(#[from] SessionError),
    #[error("invalid request: `{0}`")]
    InvalidRequest(String),
}
