use std::fmt;
use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};

use crate::TokenRetrieverError;

pub type AccessToken = String;

/// A bearer token and the instant from which it must no longer be used.
///
/// Tokens are values: an expired token is replaced by a new one, never updated in place.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct Token {
    access_token: AccessToken,
    expires_on: DateTime<Utc>,
}

/// Body returned by the token endpoint. Fields other than these are ignored.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct TokenRetrievalResponse {
    pub access_token: AccessToken,
    /// The lifetime in seconds of the access token.
    #[serde(default)]
    pub expires_in: Option<u64>,
}

impl Token {
    pub fn new(access_token: AccessToken, expires_on: DateTime<Utc>) -> Self {
        Token {
            access_token,
            expires_on,
        }
    }

    /// Builds a token out of a token endpoint response.
    ///
    /// The lifetime is the reported `expires_in`, or `default_duration` when absent, shortened
    /// by `expiry_offset`.
    pub fn from_response(
        response: TokenRetrievalResponse,
        default_duration: Duration,
        expiry_offset: Duration,
    ) -> Result<Self, TokenRetrieverError> {
        let lifetime = response
            .expires_in
            .map(Duration::from_secs)
            .unwrap_or(default_duration)
            .saturating_sub(expiry_offset);

        let time_delta = TimeDelta::from_std(lifetime)
            .map_err(|e| TokenRetrieverError::TokenRetrieverError(e.to_string()))?;

        let expires_on = Utc::now().checked_add_signed(time_delta).ok_or_else(|| {
            TokenRetrieverError::TokenRetrieverError(
                "Failed to calculate expiration time".to_string(),
            )
        })?;

        Ok(Token::new(response.access_token, expires_on))
    }

    pub fn is_expired(&self) -> bool {
        Utc::now() >= self.expires_on
    }

    pub fn access_token(&self) -> &AccessToken {
        &self.access_token
    }

    pub fn expires_on(&self) -> DateTime<Utc> {
        self.expires_on
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Bearer {}", self.access_token)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use chrono::Duration as ChronoDuration;

    fn response(expires_in: Option<u64>) -> TokenRetrievalResponse {
        TokenRetrievalResponse {
            access_token: "some-token".to_string(),
            expires_in,
        }
    }

    #[test]
    fn token_is_expired() {
        let past = Utc::now() - ChronoDuration::milliseconds(10);
        let token = Token::new(AccessToken::from("some-token"), past);
        assert!(token.is_expired())
    }

    #[test]
    fn token_is_not_expired() {
        let future = Utc::now() + ChronoDuration::seconds(10);
        let token = Token::new(AccessToken::from("some-token"), future);
        assert!(!token.is_expired())
    }

    #[test]
    fn token_display_is_bearer_header() {
        let token = Token::new(AccessToken::from("some-token"), Utc::now());
        assert_eq!(token.to_string(), "Bearer some-token");
    }

    #[test]
    fn from_response_uses_expires_in_minus_offset() {
        let before = Utc::now();
        let token = Token::from_response(
            response(Some(3)),
            Duration::from_secs(300),
            Duration::from_secs(1),
        )
        .unwrap();
        let after = Utc::now();

        assert_eq!(token.access_token(), "some-token");
        assert!(token.expires_on() >= before + ChronoDuration::seconds(2));
        assert!(token.expires_on() <= after + ChronoDuration::seconds(2));
    }

    #[test]
    fn from_response_falls_back_to_default_duration() {
        let before = Utc::now();
        let token =
            Token::from_response(response(None), Duration::from_secs(300), Duration::ZERO).unwrap();

        assert!(token.expires_on() >= before + ChronoDuration::seconds(300));
        assert!(!token.is_expired());
    }

    #[test]
    fn from_response_offset_longer_than_lifetime_is_expired() {
        let token = Token::from_response(
            response(Some(1)),
            Duration::from_secs(300),
            Duration::from_secs(30),
        )
        .unwrap();

        assert!(token.is_expired());
    }

    #[test]
    fn from_response_incorrect_time() {
        let result = Token::from_response(response(Some(u64::MAX)), Duration::ZERO, Duration::ZERO);

        assert!(
            matches!(
                &result,
                Err(TokenRetrieverError::TokenRetrieverError(e)) if e == "Source duration value is out of range for the target type"
            ),
            "Expected TokenRetrieverError with specific message: '{:?}'",
            result
        );
    }

    #[test]
    fn deserialize_response_ignores_extra_fields() {
        let body = r#"{"access_token":"tok","expires_in":3,"token_type":"Bearer","scope":"openid"}"#;
        let response: TokenRetrievalResponse = serde_json::from_str(body).unwrap();
        assert_eq!(response.access_token, "tok");
        assert_eq!(response.expires_in, Some(3));
    }
}
