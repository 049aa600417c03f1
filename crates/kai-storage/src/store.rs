//! The working-set store shared by every backend.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use kai_crypto::{key_id, Encryptor};
use parking_lot::RwLock;
use tracing::{debug, info};

use crate::backend::RecordBackend;
use crate::error::{Result, StorageError};
use crate::record::{Record, VERSION_KEY};
use crate::storage::{Storage, SECRET_SCOPE};
use crate::value::EntryValue;

/// app -> scope -> record
type WorkingSet = HashMap<String, HashMap<String, Record>>;

/// A [`Storage`] over any [`RecordBackend`].
///
/// The store owns the rules every backend must follow: secret-scope values
/// are encrypted on the way in and decrypted on the way out, `"version"` is
/// never encrypted and never settable, and each write persists the backend
/// version plus one (or 0 for a first write).
///
/// The working set sits behind a lock so a drift poller can query versions
/// while another task owns reads and writes.
pub struct SecretStore<B> {
    deployment_id: String,
    backend: B,
    encryptor: Arc<dyn Encryptor>,
    working_set: RwLock<WorkingSet>,
}

impl<B: RecordBackend> SecretStore<B> {
    /// Creates a store for `deployment_id` over `backend`.
    pub fn new(deployment_id: impl Into<String>, backend: B, encryptor: Arc<dyn Encryptor>) -> Self {
        let deployment_id = deployment_id.into();
        info!(backend = backend.name(), %deployment_id, "secret storage ready");
        Self {
            deployment_id,
            backend,
            encryptor,
            working_set: RwLock::new(HashMap::new()),
        }
    }

    /// Returns the deployment namespace.
    #[must_use]
    pub fn deployment_id(&self) -> &str {
        &self.deployment_id
    }

    /// Returns the backend.
    #[must_use]
    pub fn backend(&self) -> &B {
        &self.backend
    }

    fn key_id(&self, app: &str) -> String {
        key_id(&self.deployment_id, app)
    }

    fn with_record<T>(&self, app: &str, scope: &str, f: impl FnOnce(&Record) -> T) -> Result<T> {
        self.working_set
            .read()
            .get(app)
            .and_then(|scopes| scopes.get(scope))
            .map(f)
            .ok_or_else(|| StorageError::not_loaded(app, scope))
    }

    fn with_record_mut<T>(
        &self,
        app: &str,
        scope: &str,
        f: impl FnOnce(&mut Record) -> T,
    ) -> Result<T> {
        self.working_set
            .write()
            .get_mut(app)
            .and_then(|scopes| scopes.get_mut(scope))
            .map(f)
            .ok_or_else(|| StorageError::not_loaded(app, scope))
    }
}

fn is_encrypted(scope: &str, name: &str) -> bool {
    scope == SECRET_SCOPE && name != VERSION_KEY
}

#[async_trait]
impl<B: RecordBackend> Storage for SecretStore<B> {
    async fn read(&self, app: &str, scope: &str) -> Result<()> {
        let record = self.backend.fetch(app, scope).await?.unwrap_or_default();
        debug!(app, scope, version = record.version, "record loaded");

        self.working_set
            .write()
            .entry(app.to_string())
            .or_default()
            .insert(scope.to_string(), record);
        Ok(())
    }

    async fn write(&self, app: &str, scope: &str) -> Result<()> {
        let mut record = self.with_record(app, scope, Clone::clone)?;

        let stored = self.backend.fetch_version(app, scope).await?;
        record.version = stored.map_or(0, |v| v + 1);

        self.backend.store(app, scope, &record).await?;
        self.with_record_mut(app, scope, |cached| cached.version = record.version)?;

        info!(app, scope, version = record.version, "record written");
        Ok(())
    }

    async fn set_entry(
        &self,
        app: &str,
        scope: &str,
        name: &str,
        value: EntryValue,
    ) -> Result<()> {
        if name == VERSION_KEY {
            // Version is owned by the store.
            debug!(app, scope, "ignoring explicit version entry");
            return self.with_record(app, scope, |_| ());
        }

        let value = if is_encrypted(scope, name) {
            let plaintext = value.as_str().ok_or_else(|| StorageError::TypeMismatch {
                name: name.to_string(),
            })?;
            // Fail before paying for an encryption call.
            self.with_record(app, scope, |_| ())?;
            EntryValue::String(self.encryptor.encrypt(plaintext, &self.key_id(app)).await?)
        } else {
            value
        };

        self.with_record_mut(app, scope, |record| {
            record.entries.insert(name.to_string(), value);
        })
    }

    async fn get_entry(&self, app: &str, scope: &str, name: &str) -> Result<Option<EntryValue>> {
        if name == VERSION_KEY {
            return self.with_record(app, scope, |r| Some(EntryValue::from(r.version)));
        }

        let Some(raw) = self.with_record(app, scope, |r| r.entries.get(name).cloned())? else {
            return Ok(None);
        };

        if !is_encrypted(scope, name) {
            return Ok(Some(raw));
        }

        let ciphertext = raw.as_str().ok_or_else(|| StorageError::TypeMismatch {
            name: name.to_string(),
        })?;
        let plaintext = self.encryptor.decrypt(ciphertext, &self.key_id(app)).await?;
        Ok(Some(EntryValue::String(plaintext)))
    }

    fn list_entries(&self, app: &str, scope: &str) -> Result<Vec<String>> {
        self.with_record(app, scope, |r| r.entries.keys().cloned().collect())
    }

    fn delete_entry(&self, app: &str, scope: &str, name: &str) -> Result<()> {
        self.with_record_mut(app, scope, |r| {
            r.entries.remove(name);
        })
    }

    async fn list_app_names(&self) -> Result<Vec<String>> {
        let mut names = self.backend.list_app_names().await?;
        names.sort();
        names.dedup();
        Ok(names)
    }

    fn current_version(&self, app: &str, scope: &str) -> Result<i64> {
        self.with_record(app, scope, |r| r.version)
    }

    async fn latest_version(&self, app: &str, scope: &str) -> Result<i64> {
        match self.backend.fetch_version(app, scope).await? {
            Some(version) => Ok(version),
            None => Ok(self.current_version(app, scope).unwrap_or(0)),
        }
    }
}

impl<B> std::fmt::Debug for SecretStore<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let ws = self.working_set.read();
        let loaded: usize = ws.values().map(HashMap::len).sum();
        f.debug_struct("SecretStore")
            .field("deployment_id", &self.deployment_id)
            .field("loaded_records", &loaded)
            .field("entries", &"[REDACTED]")
            .finish_non_exhaustive()
    }
}
