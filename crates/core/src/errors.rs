//! Error types shared across the saldo crates.

use thiserror::Error;

/// Result type alias for core operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors surfaced by the sync core and its store collaborators.
#[derive(Debug, Error)]
pub enum Error {
    /// Remote store call failed (network, auth, API error).
    #[error("remote store error: {0}")]
    Remote(String),

    /// Durable local slot store failed.
    #[error("local store error: {0}")]
    Store(String),

    /// A mutation payload did not serialize to the shape the remote expects.
    #[error("invalid payload: {0}")]
    Payload(String),

    /// JSON (de)serialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// Create a remote store error.
    pub fn remote(message: impl Into<String>) -> Self {
        Self::Remote(message.into())
    }

    /// Create a local store error.
    pub fn store(message: impl Into<String>) -> Self {
        Self::Store(message.into())
    }

    /// Create a payload error.
    pub fn payload(message: impl Into<String>) -> Self {
        Self::Payload(message.into())
    }
}
