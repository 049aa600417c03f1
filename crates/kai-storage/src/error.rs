//! Error types for secret storage.

use kai_crypto::CryptoError;
use thiserror::Error;

/// Errors that can occur while reading, mutating or persisting records.
#[derive(Debug, Error)]
pub enum StorageError {
    /// The (app, scope) record was never read into the working set.
    #[error("{app}.{scope} is not loaded")]
    NotLoaded {
        /// Application name.
        app: String,
        /// Scope name.
        scope: String,
    },

    /// A `secret`-scope entry was not a string.
    #[error("{name} must be a string in the secret scope")]
    TypeMismatch {
        /// Entry name.
        name: String,
    },

    /// Encrypting or decrypting a secret value failed.
    #[error(transparent)]
    Encryption(#[from] CryptoError),

    /// The persistence layer failed.
    #[error("{backend} backend error: {reason}")]
    Backend {
        /// Backend name.
        backend: &'static str,
        /// Underlying failure.
        reason: String,
    },

    /// A persisted record could not be interpreted.
    #[error("invalid record: {reason}")]
    InvalidRecord {
        /// What was wrong with it.
        reason: String,
    },

    /// An `app.scope.var` pattern could not be parsed.
    #[error("invalid entry pattern {pattern:?}: expected app.scope.var")]
    InvalidPattern {
        /// The pattern as given.
        pattern: String,
    },

    /// JSON (de)serialization failed.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// A secrets file could not be encoded or decoded.
    #[error("secrets file error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

impl StorageError {
    /// Builds a [`StorageError::Backend`] from any displayable failure.
    pub fn backend(backend: &'static str, reason: impl std::fmt::Display) -> Self {
        Self::Backend {
            backend,
            reason: reason.to_string(),
        }
    }

    pub(crate) fn not_loaded(app: &str, scope: &str) -> Self {
        Self::NotLoaded {
            app: app.to_string(),
            scope: scope.to_string(),
        }
    }
}

/// Result type alias for storage operations.
pub type Result<T> = std::result::Result<T, StorageError>;
