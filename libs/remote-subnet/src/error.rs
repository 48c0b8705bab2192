//! Error types for remote subnet manager operations.
//!
//! Callers can tell apart construction mistakes, transport failures (which
//! include cancellation), protocol violations, and decode failures without
//! inspecting message text.

use reqwest::StatusCode;
use thiserror::Error;

/// Boxed error returned by a [`Transport`](crate::transport::Transport).
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Top-level error type for the remote-subnet crate.
#[derive(Debug, Error)]
pub enum RemoteError {
    /// The base endpoint could not be parsed into an absolute URL.
    #[error("invalid endpoint '{endpoint}': {reason}")]
    InvalidEndpoint { endpoint: String, reason: String },

    /// Request body could not be serialized. Raised before any network I/O.
    #[error("failed to encode request body: {0}")]
    Encode(#[source] serde_json::Error),

    /// Failure reported by the transport, passed through unchanged.
    #[error(transparent)]
    Transport(BoxError),

    /// The caller's context was cancelled.
    #[error("context canceled")]
    Canceled,

    /// The caller's context deadline passed.
    #[error("context deadline exceeded")]
    DeadlineExceeded,

    /// The coordinator answered with anything other than `200 OK`.
    #[error("{}: {body}", status_line(.status))]
    Status { status: StatusCode, body: String },

    /// Cursor contract violation, on either side of the wire.
    #[error("protocol error: {0}")]
    Protocol(String),

    /// Response body did not match the expected record.
    #[error("failed to decode response body: {0}")]
    Decode(#[source] serde_json::Error),
}

/// `404 Not Found`, or just `499` when the code has no canonical reason.
fn status_line(status: &StatusCode) -> String {
    match status.canonical_reason() {
        Some(reason) => format!("{} {reason}", status.as_u16()),
        None => status.as_u16().to_string(),
    }
}

impl RemoteError {
    /// Returns true if the call stopped because its context was cancelled or
    /// its deadline passed.
    pub fn is_cancellation(&self) -> bool {
        matches!(self, RemoteError::Canceled | RemoteError::DeadlineExceeded)
    }

    /// Returns true for non-200 responses and cursor violations.
    pub fn is_protocol(&self) -> bool {
        matches!(self, RemoteError::Status { .. } | RemoteError::Protocol(_))
    }

    /// HTTP status of a non-200 response, if that is what this error is.
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            RemoteError::Status { status, .. } => Some(*status),
            _ => None,
        }
    }
}

/// Shorthand result alias for remote subnet operations.
pub type RemoteResult<T> = Result<T, RemoteError>;
