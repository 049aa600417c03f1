//! Error types for the Vault client.

use thiserror::Error;

/// Errors returned by [`crate::VaultClient`].
#[derive(Debug, Error)]
pub enum VaultError {
    /// No token was supplied.
    #[error("vault token is empty")]
    EmptyToken,

    /// The HTTP request could not be sent or its body could not be read.
    #[error("vault request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// Vault answered with a non-success status code.
    #[error("vault returned {status} for {path}: {message}")]
    Status {
        /// HTTP status code.
        status: u16,
        /// Logical path that was requested.
        path: String,
        /// First error reported by Vault, or the raw body.
        message: String,
    },

    /// The response body did not have the expected shape.
    #[error("malformed vault response for {path}: {reason}")]
    MalformedResponse {
        /// Logical path that was requested.
        path: String,
        /// What was missing or mistyped.
        reason: String,
    },
}

impl VaultError {
    /// Returns true if the request failed at the transport level or with a
    /// server-side (5xx) status.
    #[must_use]
    pub fn is_unavailable(&self) -> bool {
        match self {
            Self::Http(_) => true,
            Self::Status { status, .. } => *status >= 500,
            _ => false,
        }
    }
}

/// Result type alias for Vault operations.
pub type Result<T> = std::result::Result<T, VaultError>;
