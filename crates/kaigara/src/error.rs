//! Errors surfaced by the binaries.

use kai_config::ConfigError;
use kai_crypto::CryptoError;
use kai_env::EnvError;
use kai_logstream::LogStreamError;
use kai_storage::StorageError;
use kai_supervisor::SupervisorError;
use kai_vault::VaultError;
use thiserror::Error;

/// Errors from `kaigara` and `kai`.
#[derive(Debug, Error)]
pub enum CliError {
    /// Configuration is missing or invalid.
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Talking to Vault failed.
    #[error(transparent)]
    Vault(#[from] VaultError),

    /// Setting up an encryptor failed.
    #[error(transparent)]
    Crypto(#[from] CryptoError),

    /// A storage operation failed.
    #[error(transparent)]
    Storage(#[from] StorageError),

    /// Composing entries failed.
    #[error(transparent)]
    Env(#[from] EnvError),

    /// The log transport failed.
    #[error(transparent)]
    LogStream(#[from] LogStreamError),

    /// Supervising the child failed.
    #[error(transparent)]
    Supervisor(#[from] SupervisorError),

    /// Reading or writing a local file failed.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// No entry with the requested name.
    #[error("no value for such key: {0}")]
    UnknownKey(String),

    /// The command needs Redis but no URL is configured.
    #[error("KAIGARA_REDIS_URL is required for {0}")]
    RedisRequired(&'static str),
}

/// Result type alias for the binaries.
pub type Result<T> = std::result::Result<T, CliError>;
