//! Shared network error classification.
//!
//! Every HTTP client in the workspace maps `reqwest` failures through
//! [`ReqwestErrorExt`] so callers can tell timeouts from refused connections
//! and server errors without inspecting `reqwest` directly.

use thiserror::Error;

/// Network-related errors (HTTP, connectivity).
#[derive(Debug, Error)]
pub enum NetworkError {
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    #[error("Request timed out")]
    Timeout,

    #[error("Server error: {status} - {message}")]
    ServerError { status: u16, message: String },

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("HTTP client setup failed: {0}")]
    ClientBuild(String),
}

impl NetworkError {
    /// Whether the failure is transient (timeouts, refused connections, 5xx).
    pub fn is_transient(&self) -> bool {
        match self {
            NetworkError::Timeout | NetworkError::ConnectionFailed(_) => true,
            NetworkError::ServerError { status, .. } => *status >= 500 || *status == 429,
            NetworkError::InvalidResponse(_) | NetworkError::ClientBuild(_) => false,
        }
    }
}

/// Extension trait for converting reqwest errors to our error types.
pub trait ReqwestErrorExt {
    fn into_network_error(self) -> NetworkError;
}

impl ReqwestErrorExt for reqwest::Error {
    fn into_network_error(self) -> NetworkError {
        if self.is_timeout() {
            NetworkError::Timeout
        } else if self.is_connect() {
            NetworkError::ConnectionFailed(self.to_string())
        } else if let Some(status) = self.status() {
            NetworkError::ServerError {
                status: status.as_u16(),
                message: self.to_string(),
            }
        } else if self.is_decode() {
            NetworkError::InvalidResponse(self.to_string())
        } else if self.is_builder() {
            NetworkError::ClientBuild(self.to_string())
        } else {
            NetworkError::ConnectionFailed(self.to_string())
        }
    }
}
