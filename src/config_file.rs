use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use serde_json::Value;
use tracing::debug;

use crate::credentials::RawCredentials;

#[derive(thiserror::Error, Debug)]
pub enum ConfigFileError {
    #[error("config file not found: `{0}`")]
    NotFound(PathBuf),
    #[error("could not read config file `{0}`: {1}")]
    Read(PathBuf, String),
    #[error("could not parse config file `{0}`: {1}")]
    Parse(PathBuf, String),
}

/// Reads the credential mapping stored in a JSON config file.
///
/// No path means no config file was supplied, which yields an empty mapping.
pub fn read_config_file(path: Option<&Path>) -> Result<RawCredentials, ConfigFileError> {
    let Some(path) = path else {
        return Ok(RawCredentials::new());
    };

    let content = fs::read_to_string(path).map_err(|e| match e.kind() {
        ErrorKind::NotFound => ConfigFileError::NotFound(path.to_path_buf()),
        _ => ConfigFileError::Read(path.to_path_buf(), e.to_string()),
    })?;
    debug!(path = %path.display(), "reading credentials from config file");

    parse_credentials(&content).map_err(|e| ConfigFileError::Parse(path.to_path_buf(), e))
}

fn parse_credentials(content: &str) -> Result<RawCredentials, String> {
    let value: Value = serde_json::from_str(content).map_err(|e| e.to_string())?;
    let Value::Object(entries) = value else {
        return Err("expected a JSON object".to_string());
    };

    entries
        .into_iter()
        .map(|(key, value)| match value {
            Value::String(s) => Ok((key, Some(s))),
            Value::Null => Ok((key, None)),
            other => Err(format!("value of `{key}` must be a string or null, got `{other}`")),
        })
        .collect()
}
