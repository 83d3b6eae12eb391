//! Shared HTTP client for remote search backends.
//!
//! One [`reqwest::Client`] is built at startup and handed to every
//! remote backend instance. Per-request cancellation is layered on top
//! by [`crate::backend::BackendCore::request_search`].

use crate::error::SearchError;
use std::time::Duration;

/// Build the [`reqwest::Client`] used by every remote backend.
///
/// The client carries the configured per-request timeout and a bounded
/// redirect policy. Cancellation is not a client concern — each backend
/// races its request against its own cancellation handle.
///
/// # Errors
///
/// Returns [`SearchError::Http`] if the client cannot be constructed.
pub fn build_client(timeout_seconds: u64) -> Result<reqwest::Client, SearchError> {
    reqwest::Client::builder()
        .timeout(Duration::from_secs(timeout_seconds))
        .redirect(reqwest::redirect::Policy::limited(10))
        .build()
        .map_err(|e| SearchError::Http(format!("failed to build HTTP client: {e}")))
}

/// Validate a configured service endpoint before a backend is built.
///
/// # Errors
///
/// Returns [`SearchError::Config`] for endpoints that are not absolute
/// URLs — the backend is disabled instead of failing at query time.
pub fn validate_service_url(raw: &str) -> Result<(), SearchError> {
    url::Url::parse(raw)
        .map(|_| ())
        .map_err(|e| SearchError::Config(format!("invalid service url {raw:?}: {e}")))
}
