//! Error types for the watcher and its status sources.

use thiserror::Error;

/// Errors raised while talking to a status source or decoding its output.
///
/// None of these ever reach the caller of
/// [`TxRegistry::register`](crate::registry::TxRegistry::register); they are
/// logged and recovered inside the watch task.
#[derive(Debug, Error)]
pub enum WatchError {
    /// HTTP request failed (connection refused, timeout, etc.).
    #[error("HTTP error: {0}")]
    Http(String),

    /// The server answered with a non-2xx status.
    #[error("HTTP {status}: {body}")]
    Status { status: u16, body: String },

    /// The stream response carried no readable body.
    #[error("stream response has no body")]
    MissingBody,

    /// A stream event was recognised by name but its payload was unusable.
    #[error("malformed `{event}` event: {reason}")]
    MalformedEvent { event: String, reason: String },

    /// Response could not be deserialized.
    #[error("Deserialization error: {0}")]
    Deserialization(#[from] serde_json::Error),

    /// Transaction hash is not 64 hex characters.
    #[error("invalid transaction hash: {0}")]
    InvalidTxHash(String),
}

impl WatchError {
    /// Returns `true` for transport-level failures that a later attempt may not hit.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Http(_) | Self::MissingBody => true,
            Self::Status { status, .. } => *status == 429 || *status >= 500,
            _ => false,
        }
    }
}
