//! Bounded retries with exponential backoff for transient HTTP failures.
//!
//! [`RetryingHttpClient`] wraps any [`HttpClient`] and replays a request while the outcome is
//! retryable and the budget lasts. Once the budget is spent the last outcome is handed back to
//! the caller untouched.

use std::collections::{BTreeSet, HashSet};
use std::thread;
use std::time::Duration;

use http::header::RETRY_AFTER;
use http::{Method, Request, Response};
use tracing::debug;

use crate::http_client::{HttpClient, HttpClientError};
use crate::settings::ResilienceSettings;

/// Statuses for which a `Retry-After` header replaces the computed backoff.
const RETRY_AFTER_STATUSES: [u16; 3] = [413, 429, 503];

/// Methods retried regardless of the caller; POST is only added on request.
fn default_allowed_methods() -> HashSet<Method> {
    HashSet::from([
        Method::DELETE,
        Method::GET,
        Method::HEAD,
        Method::OPTIONS,
        Method::PUT,
        Method::TRACE,
    ])
}

/// Which outcomes are retried, how often, and how long to wait in between.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    total: u32,
    backoff_factor: f64,
    backoff_max: Duration,
    status_forcelist: BTreeSet<u16>,
    allowed_methods: HashSet<Method>,
}

impl RetryPolicy {
    /// Builds the policy out of the resilience settings.
    ///
    /// `include_post` adds POST to the retried methods, which is only sound for calls that are
    /// idempotent in practice, such as token fetches.
    pub fn new(settings: &ResilienceSettings, include_post: bool) -> Self {
        let mut allowed_methods = default_allowed_methods();
        if include_post {
            allowed_methods.insert(Method::POST);
        }
        Self {
            total: settings.total_retries,
            backoff_factor: settings.backoff_factor,
            backoff_max: settings.backoff_max,
            status_forcelist: settings.retryable_statuses.clone(),
            allowed_methods,
        }
    }

    pub fn total(&self) -> u32 {
        self.total
    }

    pub fn backoff_factor(&self) -> f64 {
        self.backoff_factor
    }

    pub fn status_forcelist(&self) -> &BTreeSet<u16> {
        &self.status_forcelist
    }

    pub fn allowed_methods(&self) -> &HashSet<Method> {
        &self.allowed_methods
    }

    fn is_retryable(
        &self,
        method: &Method,
        outcome: &Result<Response<Vec<u8>>, HttpClientError>,
    ) -> bool {
        if !self.allowed_methods.contains(method) {
            return false;
        }
        match outcome {
            Ok(response) => self.status_forcelist.contains(&response.status().as_u16()),
            Err(HttpClientError::TransportError(_)) => true,
            Err(_) => false,
        }
    }

    /// Sleep before the next attempt after `consecutive_errors` failed ones.
    pub fn backoff(&self, consecutive_errors: u32) -> Duration {
        if consecutive_errors <= 1 {
            return Duration::ZERO;
        }
        let exponent = i32::try_from(consecutive_errors - 1).unwrap_or(i32::MAX);
        let seconds = self.backoff_factor * 2f64.powi(exponent);
        Duration::try_from_secs_f64(seconds)
            .unwrap_or(self.backoff_max)
            .min(self.backoff_max)
    }

    fn sleep_for(
        &self,
        consecutive_errors: u32,
        outcome: &Result<Response<Vec<u8>>, HttpClientError>,
    ) -> Duration {
        retry_after(outcome).unwrap_or_else(|| self.backoff(consecutive_errors))
    }
}

/// Seconds form of the `Retry-After` header, for the statuses that honor it.
fn retry_after(outcome: &Result<Response<Vec<u8>>, HttpClientError>) -> Option<Duration> {
    let response = outcome.as_ref().ok()?;
    if !RETRY_AFTER_STATUSES.contains(&response.status().as_u16()) {
        return None;
    }
    response
        .headers()
        .get(RETRY_AFTER)?
        .to_str()
        .ok()?
        .trim()
        .parse::<u64>()
        .ok()
        .map(Duration::from_secs)
}

/// An [`HttpClient`] that retries transient failures of the client it wraps.
#[derive(Debug, Clone)]
pub struct RetryingHttpClient<C> {
    inner: C,
    policy: RetryPolicy,
}

impl<C: HttpClient> RetryingHttpClient<C> {
    pub fn new(inner: C, policy: RetryPolicy) -> Self {
        Self { inner, policy }
    }

    /// Mounts a policy built out of `settings` on `inner`.
    pub fn create(inner: C, settings: &ResilienceSettings, include_post: bool) -> Self {
        Self::new(inner, RetryPolicy::new(settings, include_post))
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }
}

impl<C: HttpClient> HttpClient for RetryingHttpClient<C> {
    fn send(&self, req: Request<Vec<u8>>) -> Result<Response<Vec<u8>>, HttpClientError> {
        let mut retries = 0;
        loop {
            let outcome = self.inner.send(clone_request(&req)?);

            if retries >= self.policy.total || !self.policy.is_retryable(req.method(), &outcome) {
                return outcome;
            }

            retries += 1;
            let sleep = self.policy.sleep_for(retries, &outcome);
            match &outcome {
                Ok(response) => debug!(
                    method = %req.method(),
                    uri = %req.uri(),
                    status = response.status().as_u16(),
                    retry = retries,
                    sleep_ms = sleep.as_millis() as u64,
                    "retrying request"
                ),
                Err(err) => debug!(
                    method = %req.method(),
                    uri = %req.uri(),
                    error = %err,
                    retry = retries,
                    sleep_ms = sleep.as_millis() as u64,
                    "retrying request"
                ),
            }
            if !sleep.is_zero() {
                thread::sleep(sleep);
            }
        }
    }
}

fn clone_request(req: &Request<Vec<u8>>) -> Result<Request<Vec<u8>>, HttpClientError> {
    let mut builder = Request::builder()
        .method(req.method().clone())
        .uri(req.uri().clone())
        .version(req.version());
    if let Some(headers) = builder.headers_mut() {
        headers.extend(req.headers().clone());
    }
    builder
        .body(req.body().clone())
        .map_err(|e| HttpClientError::EncoderError(e.to_string()))
}
