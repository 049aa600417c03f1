//! Builds the runtime components named by a [`KaigaraConfig`].

use std::sync::Arc;

use kai_config::{EncryptorKind, KaigaraConfig, StorageDriver, Termination};
use kai_crypto::{Encryptor, PlaintextEncryptor, SymmetricEncryptor, TransitEncryptor};
use kai_env::BuildOptions;
use kai_logstream::{ConsoleLogStream, LogStream, RedisLogStream};
use kai_storage::{
    KubernetesBackend, MemoryBackend, SecretStore, SqlBackend, Storage, VaultKvBackend,
};
use kai_supervisor::{SupervisorConfig, TerminationMode};
use kai_vault::VaultClient;
use tracing::{info, warn};

use crate::error::Result;

fn vault_token(config: &KaigaraConfig) -> &str {
    config.vault.token.as_deref().unwrap_or_default()
}

/// The encryptor for `secret`-scope values.
pub async fn encryptor_from_config(config: &KaigaraConfig) -> Result<Arc<dyn Encryptor>> {
    let encryptor: Arc<dyn Encryptor> = match config.encryptor {
        EncryptorKind::Plaintext => Arc::new(PlaintextEncryptor::new()),
        EncryptorKind::Aes => {
            let key = config.encryptor_key.as_deref().unwrap_or_default();
            Arc::new(SymmetricEncryptor::new(key.as_bytes())?)
        }
        EncryptorKind::Transit => {
            Arc::new(TransitEncryptor::connect(&config.vault.addr, vault_token(config)).await?)
        }
    };
    info!(encryptor = ?config.encryptor, "encryptor ready");
    Ok(encryptor)
}

/// The storage for the configured driver, encrypting with `encryptor`.
pub async fn storage_from_config(
    config: &KaigaraConfig,
    encryptor: Arc<dyn Encryptor>,
) -> Result<Arc<dyn Storage>> {
    let dep = config.deployment_id.as_str();

    let storage: Arc<dyn Storage> = match config.storage {
        StorageDriver::Vault => {
            let client = VaultClient::new(&config.vault.addr, vault_token(config))?;
            Arc::new(SecretStore::new(dep, VaultKvBackend::new(client, dep), encryptor))
        }
        StorageDriver::Sql => {
            let url = config.database.url.as_deref().unwrap_or_default();
            let backend = SqlBackend::connect(url, config.database.pool, dep).await?;
            Arc::new(SecretStore::new(dep, backend, encryptor))
        }
        StorageDriver::K8s => {
            let backend = KubernetesBackend::connect(config.kube.kubeconfig.as_deref(), dep).await?;
            Arc::new(SecretStore::new(dep, backend, encryptor))
        }
        StorageDriver::Memory => {
            warn!("memory storage driver: entries are lost on exit");
            Arc::new(SecretStore::new(dep, MemoryBackend::new(), encryptor))
        }
    };
    info!(driver = ?config.storage, deployment_id = dep, "storage ready");
    Ok(storage)
}

/// Redis when a URL is configured and reachable, console output otherwise.
pub async fn logstream_from_config(config: &KaigaraConfig) -> Arc<dyn LogStream> {
    let Some(url) = config.redis_url.as_deref().filter(|u| !u.is_empty()) else {
        info!("KAIGARA_REDIS_URL unset, logging to console only");
        return Arc::new(ConsoleLogStream::new());
    };

    match RedisLogStream::connect(url).await {
        Ok(stream) => Arc::new(stream.with_echo(config.echo_logs)),
        Err(e) => {
            warn!(error = %e, "redis unavailable, logging to console only");
            Arc::new(ConsoleLogStream::new())
        }
    }
}

/// Supervisor settings derived from the configuration.
#[must_use]
pub fn supervisor_config(config: &KaigaraConfig) -> SupervisorConfig {
    SupervisorConfig {
        app_names: config.app_names.clone(),
        scopes: config.scopes.clone(),
        build: BuildOptions {
            composite: config.composite_values,
        },
        poll_interval: config.poll_interval(),
        ignore_global: config.ignore_global,
        restart_on_drift: config.restart_on_drift,
        termination: match config.termination {
            Termination::Kill => TerminationMode::Kill,
            Termination::Interrupt => TerminationMode::Interrupt {
                grace: config.grace_period(),
            },
        },
        kfile_base64: config.kfile_base64,
    }
}
