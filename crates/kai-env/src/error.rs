//! Error types for environment composition.

use kai_storage::StorageError;
use thiserror::Error;

/// Errors that can occur while building an environment.
#[derive(Debug, Error)]
pub enum EnvError {
    /// Reading entries from storage failed.
    #[error(transparent)]
    Storage(#[from] StorageError),

    /// A composite value could not be encoded.
    #[error("cannot encode composite value {key}: {reason}")]
    Composite {
        /// Entry name.
        key: String,
        /// Underlying failure.
        reason: String,
    },

    /// An unknown composite mode name was given.
    #[error("unknown composite mode {0:?} (expected skip or base64-json)")]
    UnknownCompositeMode(String),
}

/// Result type alias for environment composition.
pub type Result<T> = std::result::Result<T, EnvError>;
