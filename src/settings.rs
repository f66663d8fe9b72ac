//! Immutable settings shared by the token retrievers and the HTTP transport.
//!
//! Every value here is built once per [`Client`](crate::client::Client) and never mutated afterwards.

use http::Uri;
use std::collections::BTreeSet;
use std::time::Duration;

pub const DEFAULT_TOKEN_DURATION: Duration = Duration::from_secs(5 * 60);
pub const DEFAULT_TOKEN_TIMEOUT: Duration = Duration::from_secs(120);
/// Subtracted from every token lifetime so a token is never used in its final seconds.
pub const DEFAULT_EXPIRY_OFFSET: Duration = Duration::from_secs(30);

pub const DEFAULT_TOTAL_RETRIES: u32 = 10;
pub const DEFAULT_BACKOFF_FACTOR: f64 = 0.001;
pub const DEFAULT_BACKOFF_MAX: Duration = Duration::from_secs(120);

const PRODUCTION_DOMAIN: &str = "up42.com";
const STAGING_DOMAIN: &str = "up42.dev";
const TOKEN_PATH: &str = "/realms/public/protocol/openid-connect/token";

/// Settings of the token endpoint and the lifetime of the tokens it hands out.
#[derive(Debug, Clone, PartialEq)]
pub struct TokenProviderSettings {
    pub token_url: Uri,
    /// Lifetime assumed when the token response does not report `expires_in`.
    pub duration: Duration,
    /// Timeout of every HTTP call, token fetches and business calls alike.
    pub timeout: Duration,
    pub expiry_offset: Duration,
}

impl TokenProviderSettings {
    pub fn new(token_url: Uri) -> Self {
        Self {
            token_url,
            duration: DEFAULT_TOKEN_DURATION,
            timeout: DEFAULT_TOKEN_TIMEOUT,
            expiry_offset: DEFAULT_EXPIRY_OFFSET,
        }
    }

    pub fn with_duration(self, duration: Duration) -> Self {
        Self { duration, ..self }
    }

    pub fn with_timeout(self, timeout: Duration) -> Self {
        Self { timeout, ..self }
    }

    pub fn with_expiry_offset(self, expiry_offset: Duration) -> Self {
        Self {
            expiry_offset,
            ..self
        }
    }
}

/// Retry budget applied by the transport to transient failures.
#[derive(Debug, Clone, PartialEq)]
pub struct ResilienceSettings {
    pub total_retries: u32,
    pub backoff_factor: f64,
    pub retryable_statuses: BTreeSet<u16>,
    pub backoff_max: Duration,
}

impl Default for ResilienceSettings {
    fn default() -> Self {
        let mut retryable_statuses: BTreeSet<u16> = (500..=599).collect();
        retryable_statuses.insert(429);
        Self {
            total_retries: DEFAULT_TOTAL_RETRIES,
            backoff_factor: DEFAULT_BACKOFF_FACTOR,
            retryable_statuses,
            backoff_max: DEFAULT_BACKOFF_MAX,
        }
    }
}

impl ResilienceSettings {
    pub fn with_total_retries(self, total_retries: u32) -> Self {
        Self {
            total_retries,
            ..self
        }
    }

    pub fn with_backoff_factor(self, backoff_factor: f64) -> Self {
        Self {
            backoff_factor,
            ..self
        }
    }

    pub fn with_retryable_statuses<I: IntoIterator<Item = u16>>(self, statuses: I) -> Self {
        Self {
            retryable_statuses: statuses.into_iter().collect(),
            ..self
        }
    }
}

/// The UP42 deployment a client talks to.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Environment {
    #[default]
    Production,
    Staging,
    Custom {
        api_url: Uri,
        token_url: Uri,
    },
}

impl TryFrom<&str> for Environment {
    type Error = String;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value.to_lowercase().as_str() {
            "com" | "production" => Ok(Self::Production),
            "dev" | "staging" => Ok(Self::Staging),
            _ => Err(format!("Invalid environment: {value}")),
        }
    }
}

impl Environment {
    /// URI of the OpenID Connect token endpoint.
    pub fn token_endpoint(&self) -> Uri {
        match self {
            Self::Production => known_uri(format!("https://auth.{PRODUCTION_DOMAIN}{TOKEN_PATH}")),
            Self::Staging => known_uri(format!("https://auth.{STAGING_DOMAIN}{TOKEN_PATH}")),
            Self::Custom { token_url, .. } => token_url.to_owned(),
        }
    }

    /// Base URI of the UP42 API; business paths are appended to it.
    pub fn api_endpoint(&self) -> Uri {
        match self {
            Self::Production => known_uri(format!("https://api.{PRODUCTION_DOMAIN}")),
            Self::Staging => known_uri(format!("https://api.{STAGING_DOMAIN}")),
            Self::Custom { api_url, .. } => api_url.to_owned(),
        }
    }

    /// Joins `path` to the API base, keeping exactly one slash between them.
    pub fn endpoint(&self, path: &str) -> Result<Uri, String> {
        let base = self.api_endpoint().to_string();
        let joined = format!(
            "{}/{}",
            base.trim_end_matches('/'),
            path.trim_start_matches('/')
        );
        joined
            .parse()
            .map_err(|e| format!("invalid endpoint `{joined}`: {e}"))
    }
}

fn known_uri(uri: String) -> Uri {
    Uri::try_from(uri).expect("Failed to parse known UP42 URL")
}
