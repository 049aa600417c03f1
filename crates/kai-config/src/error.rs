//! Configuration errors.

use std::path::PathBuf;

use thiserror::Error;

/// Errors that can occur while loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The configuration file could not be read.
    #[error("failed to read config file '{}': {source}", path.display())]
    Read {
        /// File that was requested.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The configuration file is not valid TOML for this schema.
    #[error("invalid TOML in '{}': {reason}", path.display())]
    Parse {
        /// File that was parsed.
        path: PathBuf,
        /// Parser message.
        reason: String,
    },

    /// A value is missing or out of range.
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Result type alias for configuration loading.
pub type Result<T> = std::result::Result<T, ConfigError>;
