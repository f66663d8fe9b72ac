//! Bearer authentication of outgoing requests.
//!
//! [`TokenCache`] owns the current [`Token`] and replaces it whenever it expires;
//! [`BearerAuthenticator`] is the per-request hook that stamps that token on every request.

use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};

use http::header::AUTHORIZATION;
use http::{HeaderValue, Request};
use tracing::debug;

use crate::token::{AccessToken, Token};
use crate::{TokenRetriever, TokenRetrieverError};

/// Holds the current token and refreshes it synchronously once it has expired.
///
/// The expiry check and the refresh happen while the token lock is held, so concurrent users of
/// one cache trigger at most one refresh per expiry.
pub struct TokenCache<R> {
    retriever: Arc<R>,
    token: Mutex<Token>,
}

impl<R: TokenRetriever> TokenCache<R> {
    /// Creates the cache, fetching the first token right away.
    pub fn new(retriever: R) -> Result<Self, TokenRetrieverError> {
        let token = retriever.retrieve()?;
        debug!(expires_on = %token.expires_on(), "authorization token retrieved");
        Ok(Self {
            retriever: Arc::new(retriever),
            token: Mutex::new(token),
        })
    }

    /// Returns the current token, replacing it first if it has expired.
    pub fn token(&self) -> Result<Token, TokenRetrieverError> {
        let mut current = self
            .token
            .lock()
            .map_err(|_| TokenRetrieverError::PoisonError)?;

        if current.is_expired() {
            let token = self.retriever.retrieve()?;
            debug!(expires_on = %token.expires_on(), "authorization token refreshed");
            *current = token;
        }

        Ok(current.to_owned())
    }
}

impl<R> TokenCache<R> {
    /// The token currently held, without checking its expiry.
    fn snapshot(&self) -> Token {
        self.token
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .to_owned()
    }
}

/// Clones share the retriever and start from the token held at the time of cloning, so cloning
/// never reaches the token endpoint.
impl<R> Clone for TokenCache<R> {
    fn clone(&self) -> Self {
        Self {
            retriever: Arc::clone(&self.retriever),
            token: Mutex::new(self.snapshot()),
        }
    }
}

impl<R> PartialEq for TokenCache<R> {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.retriever, &other.retriever) && self.snapshot() == other.snapshot()
    }
}

impl<R> fmt::Debug for TokenCache<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenCache")
            .field("expires_on", &self.snapshot().expires_on())
            .finish_non_exhaustive()
    }
}

/// Attaches `Authorization: Bearer <token>` to outgoing requests.
pub struct BearerAuthenticator<R> {
    cache: TokenCache<R>,
}

// No bounds on R: retrievers need not be Clone, PartialEq or Debug.
impl<R> Clone for BearerAuthenticator<R> {
    fn clone(&self) -> Self {
        Self {
            cache: self.cache.clone(),
        }
    }
}

impl<R> PartialEq for BearerAuthenticator<R> {
    fn eq(&self, other: &Self) -> bool {
        self.cache == other.cache
    }
}

impl<R> fmt::Debug for BearerAuthenticator<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BearerAuthenticator")
            .field("cache", &self.cache)
            .finish()
    }
}

impl<R: TokenRetriever> BearerAuthenticator<R> {
    /// Authenticates eagerly: the first token is fetched before this returns.
    pub fn new(retriever: R) -> Result<Self, TokenRetrieverError> {
        Ok(Self {
            cache: TokenCache::new(retriever)?,
        })
    }

    /// The current access token, refreshed if it had expired.
    pub fn access_token(&self) -> Result<AccessToken, TokenRetrieverError> {
        Ok(self.cache.token()?.access_token().to_owned())
    }

    pub fn token(&self) -> Result<Token, TokenRetrieverError> {
        self.cache.token()
    }

    /// Sets the authorization header of `request`, leaving everything else untouched.
    pub fn authenticate(
        &self,
        mut request: Request<Vec<u8>>,
    ) -> Result<Request<Vec<u8>>, TokenRetrieverError> {
        let token = self.cache.token()?;

        let mut bearer_token_header = HeaderValue::from_str(&token.to_string()).map_err(|_| {
            TokenRetrieverError::TokenRetrieverError(
                "invalid HTTP header value set for Authorization".to_string(),
            )
        })?;
        bearer_token_header.set_sensitive(true);

        request.headers_mut().insert(AUTHORIZATION, bearer_token_header);
        Ok(request)
    }
}
