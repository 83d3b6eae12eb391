//! Error types for the portal-search crate.
//!
//! All errors use stable string messages suitable for display to users
//! and programmatic handling. Cancellation is a distinct variant so the
//! orchestrator can suppress it without logging.

/// Errors that can occur during federated search operations.
#[derive(Debug, thiserror::Error)]
pub enum SearchError {
    /// Required backend settings are missing or malformed. The affected
    /// backend's query is never sent; the user is alerted.
    #[error("config error: {0}")]
    Config(String),

    /// An HTTP request to a search backend failed, or the backend
    /// answered with a non-200 status.
    #[error("HTTP error: {0}")]
    Http(String),

    /// Failed to decode a backend response body.
    #[error("parse error: {0}")]
    Parse(String),

    /// An in-flight request was superseded by a newer one on the same
    /// backend instance. Never surfaced to the user, never logged as an
    /// error.
    #[error("request cancelled")]
    Cancelled,
}

impl SearchError {
    /// Whether this error is a cancellation of a superseded request.
    ///
    /// Cancellations are suppressed by the orchestrator instead of being
    /// logged like real backend failures.
    pub fn is_cancellation(&self) -> bool {
        matches!(self, SearchError::Cancelled)
    }
}

/// Convenience type alias for portal-search results.
pub type Result<T> = std::result::Result<T, SearchError>;
