//! Classification of raw credential mappings into typed settings.
//!
//! A client can be given credentials from several places (a config file, explicit project
//! arguments, explicit account arguments). Each source is classified on its own with [`detect`]
//! and then the results are folded with [`merge`], which refuses to pick between two complete
//! sources instead of applying a silent precedence rule.

use std::collections::BTreeMap;
use std::fmt;

use thiserror::Error;
use tracing::{debug, warn};

pub const PROJECT_ID_KEY: &str = "project_id";
pub const PROJECT_API_KEY_KEY: &str = "project_api_key";
pub const USERNAME_KEY: &str = "username";
pub const PASSWORD_KEY: &str = "password";

/// A credential mapping as found in a config file or call arguments. `None` and empty strings
/// are both treated as absent values.
pub type RawCredentials = BTreeMap<String, Option<String>>;

#[derive(Error, Debug, PartialEq)]
pub enum CredentialsError {
    #[error("no credentials provided: pass a config file, project keys or account credentials")]
    MissingCredentials,
    #[error("credentials provided from more than one source, only one is allowed")]
    MultipleCredentialsSources,
    #[error("incomplete credentials: `{0}`")]
    IncompleteCredentials(String),
    /// The mapping matches neither credential shape. It is described by its keys, each marked
    /// `<set>` or `<unset>`; the values are never included.
    #[error("invalid credentials: `{0}`")]
    InvalidCredentials(String),
}

#[derive(Clone, PartialEq)]
pub struct ProjectCredentialsSettings {
    pub project_id: String,
    pub project_api_key: String,
}

impl fmt::Debug for ProjectCredentialsSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProjectCredentialsSettings")
            .field("project_id", &self.project_id)
            .field("project_api_key", &"<hidden>")
            .finish()
    }
}

#[derive(Clone, PartialEq)]
pub struct AccountCredentialsSettings {
    pub username: String,
    pub password: String,
}

impl fmt::Debug for AccountCredentialsSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AccountCredentialsSettings")
            .field("username", &self.username)
            .field("password", &"<hidden>")
            .finish()
    }
}

/// The one credential set used to authenticate a client.
#[derive(Debug, Clone, PartialEq)]
pub enum CredentialsSettings {
    Project(ProjectCredentialsSettings),
    Account(AccountCredentialsSettings),
}

impl CredentialsSettings {
    /// Project based authentication is being phased out in favour of account credentials.
    pub fn is_deprecated(&self) -> bool {
        matches!(self, CredentialsSettings::Project(_))
    }
}

impl From<ProjectCredentialsSettings> for CredentialsSettings {
    fn from(settings: ProjectCredentialsSettings) -> Self {
        CredentialsSettings::Project(settings)
    }
}

impl From<AccountCredentialsSettings> for CredentialsSettings {
    fn from(settings: AccountCredentialsSettings) -> Self {
        CredentialsSettings::Account(settings)
    }
}

/// Builds the raw mapping for explicit project arguments.
pub fn project_source(project_id: Option<String>, project_api_key: Option<String>) -> RawCredentials {
    BTreeMap::from([
        (PROJECT_ID_KEY.to_string(), project_id),
        (PROJECT_API_KEY_KEY.to_string(), project_api_key),
    ])
}

/// Builds the raw mapping for explicit account arguments.
pub fn account_source(username: Option<String>, password: Option<String>) -> RawCredentials {
    BTreeMap::from([
        (USERNAME_KEY.to_string(), username),
        (PASSWORD_KEY.to_string(), password),
    ])
}

fn is_present(value: &Option<String>) -> bool {
    value.as_deref().is_some_and(|v| !v.is_empty())
}

fn has_exact_keys(raw: &RawCredentials, expected: [&str; 2]) -> bool {
    raw.len() == expected.len() && expected.iter().all(|k| raw.contains_key(*k))
}

fn value_of(raw: &RawCredentials, key: &str) -> String {
    raw.get(key).cloned().flatten().unwrap_or_default()
}

/// Values are secrets, so only the keys and whether each one was set end up in error messages.
fn describe(raw: &RawCredentials) -> String {
    let fields: Vec<String> = raw
        .iter()
        .map(|(k, v)| {
            let state = if is_present(v) { "<set>" } else { "<unset>" };
            format!("{k}: {state}")
        })
        .collect();
    format!("{{{}}}", fields.join(", "))
}

/// Classifies a single credential source.
///
/// Returns `Ok(None)` when the source carries no value at all, the typed settings when every
/// value is present and the keys are a known set, and an error otherwise.
pub fn detect(raw: &RawCredentials) -> Result<Option<CredentialsSettings>, CredentialsError> {
    let present = raw.values().filter(|v| is_present(v)).count();

    if present == 0 {
        return Ok(None);
    }
    if present < raw.len() {
        return Err(CredentialsError::IncompleteCredentials(describe(raw)));
    }

    if has_exact_keys(raw, [PROJECT_ID_KEY, PROJECT_API_KEY_KEY]) {
        warn!(
            "project based authentication will be deprecated, use account credentials (username and password) instead"
        );
        return Ok(Some(
            ProjectCredentialsSettings {
                project_id: value_of(raw, PROJECT_ID_KEY),
                project_api_key: value_of(raw, PROJECT_API_KEY_KEY),
            }
            .into(),
        ));
    }
    if has_exact_keys(raw, [USERNAME_KEY, PASSWORD_KEY]) {
        return Ok(Some(
            AccountCredentialsSettings {
                username: value_of(raw, USERNAME_KEY),
                password: value_of(raw, PASSWORD_KEY),
            }
            .into(),
        ));
    }

    Err(CredentialsError::InvalidCredentials(describe(raw)))
}

/// Combines two detected sources; at most one of them may be present.
pub fn merge(
    left: Option<CredentialsSettings>,
    right: Option<CredentialsSettings>,
) -> Result<Option<CredentialsSettings>, CredentialsError> {
    match (left, right) {
        (Some(_), Some(_)) => Err(CredentialsError::MultipleCredentialsSources),
        (Some(settings), None) | (None, Some(settings)) => Ok(Some(settings)),
        (None, None) => Ok(None),
    }
}

/// Detects every source and resolves exactly one set of credentials out of them.
pub fn resolve<I>(sources: I) -> Result<CredentialsSettings, CredentialsError>
where
    I: IntoIterator<Item = RawCredentials>,
{
    let mut resolved = None;
    for source in sources {
        let detected = detect(&source)?;
        resolved = merge(resolved, detected)?;
    }

    let settings = resolved.ok_or(CredentialsError::MissingCredentials)?;
    debug!(deprecated = settings.is_deprecated(), "credentials resolved");
    Ok(settings)
}
