//! # kai-config
//!
//! Configuration for the `kaigara` supervisor and the `kai` CLI.
//!
//! Three layers, lowest precedence first:
//!
//! 1. built-in defaults ([`KaigaraConfig::default`])
//! 2. a TOML file: `--config` / `KAIGARA_CONFIG`, or `kaiconf.toml` when present
//! 3. flags and `KAIGARA_*` variables ([`ConfigArgs`])
//!
//! ```toml
//! deployment_id = "opendax"
//! app_names = ["peatio"]
//! storage = "sql"
//! encryptor = "aes"
//!
//! [database]
//! url = "sqlite://kaigara.db"
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod args;
pub mod config;
pub mod error;

pub use args::{ConfigArgs, DEFAULT_CONFIG_FILE};
pub use config::{
    DatabaseConfig, EncryptorKind, KaigaraConfig, KubeConfig, StorageDriver, Termination,
    VaultConfig, DEFAULT_VAULT_ADDR,
};
pub use error::{ConfigError, Result};
pub use kai_env::CompositeMode;
