//! Error types for the hosted-backend adapters.

use thiserror::Error;

/// Result type alias for remote adapter operations.
pub type Result<T> = std::result::Result<T, RemoteError>;

/// Errors that can occur while talking to the hosted backend.
#[derive(Debug, Error)]
pub enum RemoteError {
    /// HTTP client error
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// API error response from the backend
    #[error("API error ({status}): {message}")]
    Api { status: u16, message: String },

    /// Invalid request (unknown table, malformed input, etc.)
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Authentication error (missing or invalid token)
    #[error("Authentication error: {0}")]
    Auth(String),

    /// Websocket channel error
    #[error("Socket error: {0}")]
    Socket(String),
}

impl RemoteError {
    /// Create an API error from status and message
    pub fn api(status: u16, message: impl Into<String>) -> Self {
        Self::Api {
            status,
            message: message.into(),
        }
    }

    /// Create an invalid request error
    pub fn invalid_request(message: impl Into<String>) -> Self {
        Self::InvalidRequest(message.into())
    }

    /// Create an auth error
    pub fn auth(message: impl Into<String>) -> Self {
        Self::Auth(message.into())
    }

    /// Create a socket error
    pub fn socket(message: impl Into<String>) -> Self {
        Self::Socket(message.into())
    }

    /// HTTP status if this is an API error.
    pub fn status_code(&self) -> Option<u16> {
        match self {
            Self::Api { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// True when the backend rejected the call as unauthenticated.
    pub fn is_unauthenticated(&self) -> bool {
        match self {
            Self::Api { status, .. } => matches!(status, 401 | 403),
            Self::Auth(_) => true,
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unauthenticated_detection() {
        assert!(RemoteError::api(401, "expired token").is_unauthenticated());
        assert!(RemoteError::auth("no session").is_unauthenticated());
        assert!(!RemoteError::api(500, "boom").is_unauthenticated());
    }
}
