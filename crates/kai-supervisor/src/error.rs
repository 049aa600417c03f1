//! Supervisor errors.

use kai_env::EnvError;
use kai_storage::StorageError;
use thiserror::Error;

/// Errors that stop the supervisor.
#[derive(Debug, Error)]
pub enum SupervisorError {
    /// The child environment could not be composed.
    #[error("failed to build environment: {0}")]
    Env(#[from] EnvError),

    /// The child could not be started.
    #[error("failed to start {command}: {source}")]
    Spawn {
        /// Program that was executed.
        command: String,
        /// Underlying OS error.
        #[source]
        source: std::io::Error,
    },

    /// Waiting for or signalling the child failed.
    #[error("process I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// No program was given.
    #[error("no command to run")]
    EmptyCommand,
}

impl From<StorageError> for SupervisorError {
    fn from(err: StorageError) -> Self {
        Self::Env(EnvError::Storage(err))
    }
}

/// Result type alias for supervisor operations.
pub type Result<T> = std::result::Result<T, SupervisorError>;
