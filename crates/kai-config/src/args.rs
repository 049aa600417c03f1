//! Flag and `KAIGARA_*` environment layer.

use std::path::{Path, PathBuf};

use clap::builder::BoolishValueParser;
use clap::Args;
use kai_env::CompositeMode;
use tracing::debug;

use crate::config::{EncryptorKind, KaigaraConfig, StorageDriver, Termination};
use crate::error::Result;

/// File read when `--config` is not given, if it exists.
pub const DEFAULT_CONFIG_FILE: &str = "kaiconf.toml";

/// Configuration flags shared by every binary.
///
/// Every flag is optional so that an unset flag leaves the file (or
/// built-in default) value in place.
#[derive(Args, Debug, Clone, Default, PartialEq, Eq)]
pub struct ConfigArgs {
    /// TOML configuration file.
    #[arg(long = "config", env = "KAIGARA_CONFIG", value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Deployment namespace.
    #[arg(long, env = "KAIGARA_DEPLOYMENT_ID")]
    pub deployment_id: Option<String>,

    /// Comma-separated app names.
    #[arg(long, env = "KAIGARA_APP_NAMES", value_delimiter = ',')]
    pub app_names: Option<Vec<String>>,

    /// Comma-separated scopes.
    #[arg(long, env = "KAIGARA_SCOPES", value_delimiter = ',')]
    pub scopes: Option<Vec<String>>,

    /// Storage backend.
    #[arg(long = "storage-driver", env = "KAIGARA_STORAGE_DRIVER", value_enum)]
    pub storage: Option<StorageDriver>,

    /// Encryption strategy for the secret scope.
    #[arg(long, env = "KAIGARA_ENCRYPTOR", value_enum)]
    pub encryptor: Option<EncryptorKind>,

    /// Key for the aes encryptor.
    #[arg(long = "encryptor-aes-key", env = "KAIGARA_ENCRYPTOR_AES_KEY", hide_env_values = true)]
    pub encryptor_key: Option<String>,

    /// Vault address.
    #[arg(long, env = "KAIGARA_VAULT_ADDR")]
    pub vault_addr: Option<String>,

    /// Vault token.
    #[arg(long, env = "KAIGARA_VAULT_TOKEN", hide_env_values = true)]
    pub vault_token: Option<String>,

    /// SQL connection URL.
    #[arg(long, env = "KAIGARA_DATABASE_URL", hide_env_values = true)]
    pub database_url: Option<String>,

    /// SQL pool size.
    #[arg(long, env = "KAIGARA_DATABASE_POOL")]
    pub database_pool: Option<u32>,

    /// Kubeconfig file for the k8s driver.
    #[arg(long, env = "KAIGARA_KUBECONFIG", value_name = "FILE")]
    pub kubeconfig: Option<PathBuf>,

    /// Redis URL for log streaming.
    #[arg(long, env = "KAIGARA_REDIS_URL", hide_env_values = true)]
    pub redis_url: Option<String>,

    /// Echo child output when streaming to Redis.
    #[arg(long, env = "KAIGARA_ECHO_LOGS", value_parser = BoolishValueParser::new(),
          num_args = 0..=1, require_equals = true, default_missing_value = "true")]
    pub echo_logs: Option<bool>,

    /// Default log filter.
    #[arg(long, env = "KAIGARA_LOG_LEVEL")]
    pub log_level: Option<String>,

    /// Leave `global` out of drift polling.
    #[arg(long, env = "KAIGARA_IGNORE_GLOBAL", value_parser = BoolishValueParser::new(),
          num_args = 0..=1, require_equals = true, default_missing_value = "true")]
    pub ignore_global: Option<bool>,

    /// List and map handling: skip or base64-json.
    #[arg(long, env = "KAIGARA_COMPOSITE_VALUES")]
    pub composite_values: Option<CompositeMode>,

    /// Seconds between drift polls.
    #[arg(long = "poll-interval", env = "KAIGARA_POLL_INTERVAL", value_name = "SECS")]
    pub poll_interval_secs: Option<u64>,

    /// Restart the child after a drift kill.
    #[arg(long, env = "KAIGARA_RESTART_ON_DRIFT", value_parser = BoolishValueParser::new(),
          num_args = 0..=1, require_equals = true, default_missing_value = "true")]
    pub restart_on_drift: Option<bool>,

    /// How a drifted child is stopped.
    #[arg(long, env = "KAIGARA_TERMINATION", value_enum)]
    pub termination: Option<Termination>,

    /// Seconds between SIGTERM and SIGKILL.
    #[arg(long = "grace-period", env = "KAIGARA_GRACE_PERIOD", value_name = "SECS")]
    pub grace_period_secs: Option<u64>,

    /// Decode KFILE contents from base64 before writing.
    #[arg(long, env = "KAIGARA_KFILE_BASE64", value_parser = BoolishValueParser::new(),
          num_args = 0..=1, require_equals = true, default_missing_value = "true")]
    pub kfile_base64: Option<bool>,
}

fn clean_list(items: &[String]) -> Vec<String> {
    items
        .iter()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

impl ConfigArgs {
    /// The file layer: `--config` when given, otherwise
    /// [`DEFAULT_CONFIG_FILE`] when it exists.
    #[must_use]
    pub fn config_path(&self) -> Option<PathBuf> {
        self.config.clone().or_else(|| {
            let default = Path::new(DEFAULT_CONFIG_FILE);
            default.is_file().then(|| default.to_path_buf())
        })
    }

    /// Overrides `config` with every flag that was set.
    pub fn apply(&self, config: &mut KaigaraConfig) {
        if let Some(v) = &self.deployment_id {
            config.deployment_id.clone_from(v);
        }
        if let Some(v) = &self.app_names {
            config.app_names = clean_list(v);
        }
        if let Some(v) = &self.scopes {
            config.scopes = clean_list(v);
        }
        if let Some(v) = self.storage {
            config.storage = v;
        }
        if let Some(v) = self.encryptor {
            config.encryptor = v;
        }
        if let Some(v) = &self.encryptor_key {
            config.encryptor_key = Some(v.clone());
        }
        if let Some(v) = &self.vault_addr {
            config.vault.addr.clone_from(v);
        }
        if let Some(v) = &self.vault_token {
            config.vault.token = Some(v.clone());
        }
        if let Some(v) = &self.database_url {
            config.database.url = Some(v.clone());
        }
        if let Some(v) = self.database_pool {
            config.database.pool = v;
        }
        if let Some(v) = &self.kubeconfig {
            config.kube.kubeconfig = Some(v.clone());
        }
        if let Some(v) = &self.redis_url {
            config.redis_url = Some(v.clone());
        }
        if let Some(v) = self.echo_logs {
            config.echo_logs = v;
        }
        if let Some(v) = &self.log_level {
            config.log_level.clone_from(v);
        }
        if let Some(v) = self.ignore_global {
            config.ignore_global = v;
        }
        if let Some(v) = self.composite_values {
            config.composite_values = v;
        }
        if let Some(v) = self.poll_interval_secs {
            config.poll_interval_secs = v;
        }
        if let Some(v) = self.restart_on_drift {
            config.restart_on_drift = v;
        }
        if let Some(v) = self.termination {
            config.termination = v;
        }
        if let Some(v) = self.grace_period_secs {
            config.grace_period_secs = v;
        }
        if let Some(v) = self.kfile_base64 {
            config.kfile_base64 = v;
        }
    }

    /// Builds the configuration: defaults, then the file layer, then flags.
    /// The result is validated.
    pub fn load(&self) -> Result<KaigaraConfig> {
        let mut config = match self.config_path() {
            Some(path) => {
                debug!(path = %path.display(), "loading config file");
                KaigaraConfig::from_file(&path)?
            }
            None => KaigaraConfig::default(),
        };
        self.apply(&mut config);
        config.validate()?;
        Ok(config)
    }
}
