//! Common error types for stocksheet.

use thiserror::Error;

/// Top-level error type for stocksheet operations.
#[derive(Debug, Error)]
pub enum Error {
    /// Interactive authorization failed: consent denied, callback timeout,
    /// CSRF mismatch, or invalid client configuration.
    #[error("Authorization error: {0}")]
    Authorization(String),

    /// Refresh token exchange was rejected.
    #[error("Token refresh error: {0}")]
    Refresh(String),

    /// Network failure while talking to the remote service.
    #[error("Transport error: {0}")]
    Transport(String),

    /// Remote service answered with a non-success status.
    #[error("Remote service error: {0}")]
    Remote(String),

    /// Resource not found.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Operation not permitted.
    #[error("Not permitted: {0}")]
    NotPermitted(String),

    /// Invalid input provided.
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// I/O operation failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization or deserialization failed.
    #[error("Serialization error: {0}")]
    Serialization(String),
}

/// Result type alias using the common Error.
pub type Result<T> = std::result::Result<T, Error>;
