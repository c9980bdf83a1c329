use thiserror::Error;

use amicale_shared::protocol::RecordError;

/// Errors produced by the persistence-API client.
#[derive(Error, Debug)]
pub enum ApiError {
    /// Transport-level failure (connection refused, timeout, bad TLS...).
    #[error("Transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// The server answered with a non-success status.
    #[error("Server returned {status}: {message}")]
    Status { status: u16, message: String },

    /// The server answered with a record violating a model invariant.
    #[error("Malformed record: {0}")]
    Record(#[from] RecordError),
}

impl ApiError {
    /// Whether the failure denotes a missing or already-gone resource.
    pub fn is_not_found(&self) -> bool {
        matches!(self, ApiError::Status { status: 404, .. })
    }

    /// Whether the failure denotes a refused authorization.
    pub fn is_forbidden(&self) -> bool {
        matches!(self, ApiError::Status { status: 403, .. })
    }
}

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, ApiError>;
