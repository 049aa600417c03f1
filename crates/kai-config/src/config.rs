//! Typed configuration and its validation.

use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use clap::ValueEnum;
use kai_env::CompositeMode;
use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, Result};

/// Default Vault address.
pub const DEFAULT_VAULT_ADDR: &str = "http://localhost:8200";

/// Where records are persisted.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum StorageDriver {
    /// Vault KV v2.
    #[default]
    Vault,
    /// A SQL database (SQLite or PostgreSQL).
    Sql,
    /// Kubernetes secrets.
    #[serde(alias = "kubernetes")]
    #[value(alias = "kubernetes")]
    K8s,
    /// Process memory; nothing survives a restart.
    Memory,
}

/// How `secret`-scope values are encrypted.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum EncryptorKind {
    /// Vault transit engine.
    #[default]
    Transit,
    /// Local symmetric key.
    Aes,
    /// No encryption.
    Plaintext,
}

/// How the child is stopped when its secrets drift.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Termination {
    /// SIGKILL right away.
    #[default]
    Kill,
    /// SIGTERM, then SIGKILL once the grace period runs out.
    Interrupt,
}

/// Vault connection settings.
#[derive(Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct VaultConfig {
    /// Server address.
    pub addr: String,
    /// Client token.
    pub token: Option<String>,
}

impl Default for VaultConfig {
    fn default() -> Self {
        Self {
            addr: DEFAULT_VAULT_ADDR.to_string(),
            token: None,
        }
    }
}

impl fmt::Debug for VaultConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VaultConfig")
            .field("addr", &self.addr)
            .field("token", &self.token.as_ref().map(|_| "[REDACTED]"))
            .finish()
    }
}

/// SQL backend settings.
#[derive(Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct DatabaseConfig {
    /// Connection URL (`sqlite://...`, `postgres://...`).
    pub url: Option<String>,
    /// Maximum pool size.
    pub pool: u32,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self { url: None, pool: 5 }
    }
}

impl fmt::Debug for DatabaseConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // URLs may embed credentials.
        f.debug_struct("DatabaseConfig")
            .field("url", &self.url.as_ref().map(|_| "[REDACTED]"))
            .field("pool", &self.pool)
            .finish()
    }
}

/// Kubernetes backend settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct KubeConfig {
    /// Kubeconfig file; in-cluster or default configuration when unset.
    pub kubeconfig: Option<PathBuf>,
}

/// Complete, validated configuration shared by `kaigara` and `kai`.
#[allow(clippy::struct_excessive_bools)]
#[derive(Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct KaigaraConfig {
    /// Deployment namespace isolating every record.
    pub deployment_id: String,
    /// Apps whose entries are composed, in order.
    pub app_names: Vec<String>,
    /// Scopes read for each app.
    pub scopes: Vec<String>,
    /// Storage backend.
    pub storage: StorageDriver,
    /// Encryption strategy for the `secret` scope.
    pub encryptor: EncryptorKind,
    /// Key for [`EncryptorKind::Aes`]: 16, 24 or 32 bytes.
    pub encryptor_key: Option<String>,
    /// Vault settings.
    pub vault: VaultConfig,
    /// SQL settings.
    pub database: DatabaseConfig,
    /// Kubernetes settings.
    pub kube: KubeConfig,
    /// Redis URL for log lines and heartbeats; console output when unset.
    pub redis_url: Option<String>,
    /// Echo child output to the supervisor's own stdio when publishing to Redis.
    pub echo_logs: bool,
    /// Default tracing directive.
    pub log_level: String,
    /// Leave `global` out of drift polling.
    pub ignore_global: bool,
    /// Handling of list and map values in the environment.
    pub composite_values: CompositeMode,
    /// Seconds between drift polls.
    pub poll_interval_secs: u64,
    /// Restart the child after a drift kill instead of exiting.
    pub restart_on_drift: bool,
    /// How a drifted child is stopped.
    pub termination: Termination,
    /// Seconds between SIGTERM and SIGKILL in [`Termination::Interrupt`].
    pub grace_period_secs: u64,
    /// KFILE contents are base64 and are decoded before writing.
    pub kfile_base64: bool,
}

impl Default for KaigaraConfig {
    fn default() -> Self {
        Self {
            deployment_id: String::new(),
            app_names: Vec::new(),
            scopes: ["public", "private", "secret"]
                .iter()
                .map(ToString::to_string)
                .collect(),
            storage: StorageDriver::default(),
            encryptor: EncryptorKind::default(),
            encryptor_key: None,
            vault: VaultConfig::default(),
            database: DatabaseConfig::default(),
            kube: KubeConfig::default(),
            redis_url: None,
            echo_logs: true,
            log_level: "info".to_string(),
            ignore_global: false,
            composite_values: CompositeMode::default(),
            poll_interval_secs: 20,
            restart_on_drift: false,
            termination: Termination::default(),
            grace_period_secs: 10,
            kfile_base64: false,
        }
    }
}

impl fmt::Debug for KaigaraConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KaigaraConfig")
            .field("deployment_id", &self.deployment_id)
            .field("app_names", &self.app_names)
            .field("scopes", &self.scopes)
            .field("storage", &self.storage)
            .field("encryptor", &self.encryptor)
            .field("encryptor_key", &self.encryptor_key.as_ref().map(|_| "[REDACTED]"))
            .field("vault", &self.vault)
            .field("database", &self.database)
            .field("kube", &self.kube)
            .field("redis_url", &self.redis_url.as_ref().map(|_| "[REDACTED]"))
            .field("echo_logs", &self.echo_logs)
            .field("log_level", &self.log_level)
            .field("ignore_global", &self.ignore_global)
            .field("composite_values", &self.composite_values)
            .field("poll_interval_secs", &self.poll_interval_secs)
            .field("restart_on_drift", &self.restart_on_drift)
            .field("termination", &self.termination)
            .field("grace_period_secs", &self.grace_period_secs)
            .field("kfile_base64", &self.kfile_base64)
            .finish()
    }
}

fn non_empty(value: Option<&String>) -> bool {
    value.is_some_and(|v| !v.trim().is_empty())
}

impl KaigaraConfig {
    /// Parses a TOML document. Missing keys keep their defaults; the result is
    /// not validated.
    pub fn from_toml(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| ConfigError::Parse {
            path: PathBuf::from("<inline>"),
            reason: e.message().to_string(),
        })
    }

    /// Reads and parses a TOML file. The result is not validated.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&content).map_err(|e| ConfigError::Parse {
            path: path.to_path_buf(),
            reason: e.message().to_string(),
        })
    }

    /// Checks the settings every binary needs.
    pub fn validate(&self) -> Result<()> {
        if self.deployment_id.trim().is_empty() {
            return Err(ConfigError::Invalid(
                "deployment_id cannot be empty".to_string(),
            ));
        }

        if self.scopes.is_empty() {
            return Err(ConfigError::Invalid("scopes cannot be empty".to_string()));
        }

        if self.encryptor == EncryptorKind::Aes && !non_empty(self.encryptor_key.as_ref()) {
            return Err(ConfigError::Invalid(
                "encryptor_key is required for the aes encryptor".to_string(),
            ));
        }

        if self.encryptor == EncryptorKind::Transit && !non_empty(self.vault.token.as_ref()) {
            return Err(ConfigError::Invalid(
                "vault.token is required for the transit encryptor".to_string(),
            ));
        }

        match self.storage {
            StorageDriver::Vault if !non_empty(self.vault.token.as_ref()) => {
                return Err(ConfigError::Invalid(
                    "vault.token is required for the vault storage driver".to_string(),
                ));
            }
            StorageDriver::Sql if !non_empty(self.database.url.as_ref()) => {
                return Err(ConfigError::Invalid(
                    "database.url is required for the sql storage driver".to_string(),
                ));
            }
            _ => {}
        }

        if self.database.pool == 0 {
            return Err(ConfigError::Invalid(
                "database.pool must be greater than 0".to_string(),
            ));
        }

        if self.poll_interval_secs == 0 {
            return Err(ConfigError::Invalid(
                "poll_interval_secs must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }

    /// Checks that at least one app is configured, as the supervisor requires.
    pub fn require_app_names(&self) -> Result<()> {
        if self.app_names.is_empty() {
            return Err(ConfigError::Invalid(
                "app_names cannot be empty".to_string(),
            ));
        }
        Ok(())
    }

    /// Drift poll interval.
    #[must_use]
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }

    /// Grace period before a forceful kill.
    #[must_use]
    pub fn grace_period(&self) -> Duration {
        Duration::from_secs(self.grace_period_secs)
    }
}
