//! Vault transit strategy.
//!
//! Each `key_id` maps to a named transit key, created on first use. The
//! strategy also keeps its Vault token alive: when the token is renewable a
//! background task renews it at half its TTL until the encryptor is dropped.

use std::collections::HashSet;
use std::time::Duration;

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use kai_vault::VaultClient;
use parking_lot::Mutex;
use serde_json::{json, Value};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::error::{CryptoError, Result};
use crate::Encryptor;

/// Shortest period between two renewals.
const MIN_RENEW_PERIOD: Duration = Duration::from_secs(1);

/// Handle to the background token renewal task.
///
/// Dropping the handle cancels the task; [`RenewalHandle::shutdown`] also
/// waits for it to finish.
#[derive(Debug)]
pub struct RenewalHandle {
    cancel: CancellationToken,
    task: Option<JoinHandle<()>>,
}

impl RenewalHandle {
    /// Spawns a task that renews the client token at half its TTL.
    #[must_use]
    pub fn spawn(client: VaultClient, initial_ttl: Duration) -> Self {
        let cancel = CancellationToken::new();
        let token = cancel.clone();

        let task = tokio::spawn(async move {
            let mut ttl = initial_ttl;
            loop {
                let period = (ttl / 2).max(MIN_RENEW_PERIOD);
                tokio::select! {
                    () = token.cancelled() => break,
                    () = tokio::time::sleep(period) => {}
                }

                match client.renew_self().await {
                    Ok(info) => {
                        info!(ttl_secs = info.ttl.as_secs(), "renewed vault token");
                        if !info.renewable {
                            warn!("vault token is no longer renewable, stopping renewal");
                            break;
                        }
                        ttl = info.ttl;
                    }
                    Err(e) => {
                        warn!(error = %e, "vault token renewal failed");
                        break;
                    }
                }
            }
            debug!("token renewal stopped");
        });

        Self {
            cancel,
            task: Some(task),
        }
    }

    /// Returns true while the renewal task is still running.
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.task.as_ref().is_some_and(|t| !t.is_finished())
    }

    /// Cancels the renewal task and waits for it to exit.
    pub async fn shutdown(mut self) {
        self.cancel.cancel();
        if let Some(task) = self.task.take() {
            if let Err(e) = task.await {
                warn!(error = %e, "token renewal task panicked");
            }
        }
    }
}

impl Drop for RenewalHandle {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

/// Encrypts values with Vault's transit engine.
#[derive(Debug)]
pub struct TransitEncryptor {
    client: VaultClient,
    known_keys: Mutex<HashSet<String>>,
    renewal: Option<RenewalHandle>,
}

impl TransitEncryptor {
    /// Connects to Vault and starts token renewal if the token allows it.
    ///
    /// Must be called from within a tokio runtime.
    ///
    /// # Errors
    ///
    /// Returns [`CryptoError::RemoteUnavailable`] if the client cannot be
    /// built or the token lookup fails.
    pub async fn connect(addr: &str, token: &str) -> Result<Self> {
        let client = VaultClient::new(addr, token)?;
        let info = client.lookup_self().await?;

        let renewal = if info.renewable {
            info!(addr = client.addr(), "launching vault token renewal");
            Some(RenewalHandle::spawn(client.clone(), info.ttl))
        } else {
            warn!("vault token is not renewable");
            None
        };

        Ok(Self {
            client,
            known_keys: Mutex::new(HashSet::new()),
            renewal,
        })
    }

    /// Wraps an existing client without starting token renewal.
    #[must_use]
    pub fn from_client(client: VaultClient) -> Self {
        Self {
            client,
            known_keys: Mutex::new(HashSet::new()),
            renewal: None,
        }
    }

    /// Returns the token renewal handle, if renewal was started.
    #[must_use]
    pub fn renewal(&self) -> Option<&RenewalHandle> {
        self.renewal.as_ref()
    }

    /// Stops token renewal and waits for the task to exit.
    pub async fn shutdown(&mut self) {
        if let Some(renewal) = self.renewal.take() {
            renewal.shutdown().await;
        }
    }

    async fn ensure_key(&self, key: &str) -> Result<()> {
        if self.known_keys.lock().contains(key) {
            return Ok(());
        }

        let path = format!("transit/keys/{key}");
        let existing = self
            .client
            .read(&path)
            .await
            .map_err(|e| CryptoError::KeyProvisionFailed {
                key: key.to_string(),
                reason: e.to_string(),
            })?;

        if existing.is_none() {
            self.client
                .write(&path, &json!({}))
                .await
                .map_err(|e| CryptoError::KeyProvisionFailed {
                    key: key.to_string(),
                    reason: e.to_string(),
                })?;
            info!(key, "created transit key");
        }

        self.known_keys.lock().insert(key.to_string());
        Ok(())
    }
}

fn field(data: Option<Value>, name: &str) -> Option<String> {
    let data = data?;
    data.get(name)?.as_str().map(str::to_string)
}

#[async_trait]
impl Encryptor for TransitEncryptor {
    async fn encrypt(&self, plaintext: &str, key_id: &str) -> Result<String> {
        self.ensure_key(key_id).await?;

        let data = self
            .client
            .write(
                &format!("transit/encrypt/{key_id}"),
                &json!({ "plaintext": STANDARD.encode(plaintext) }),
            )
            .await?;

        field(data, "ciphertext").ok_or_else(|| CryptoError::EncryptFailed {
            reason: "ciphertext missing from vault response".to_string(),
        })
    }

    async fn decrypt(&self, ciphertext: &str, key_id: &str) -> Result<String> {
        self.ensure_key(key_id).await?;

        let data = self
            .client
            .write(
                &format!("transit/decrypt/{key_id}"),
                &json!({ "ciphertext": ciphertext }),
            )
            .await?;

        let encoded = field(data, "plaintext").ok_or_else(|| CryptoError::DecryptFailed {
            reason: "plaintext missing from vault response".to_string(),
        })?;

        let bytes = STANDARD
            .decode(&encoded)
            .map_err(|e| CryptoError::DecryptFailed {
                reason: format!("invalid base64: {e}"),
            })?;

        String::from_utf8(bytes).map_err(|e| CryptoError::DecryptFailed {
            reason: format!("plaintext is not utf-8: {e}"),
        })
    }
}
