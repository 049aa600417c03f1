//! Vault KV v2 backend.
//!
//! Layout: `secret/data/{deployment}/{app}/{scope}` holds the record
//! document (entries plus `"version"`). Apps are enumerated with
//! `LIST secret/metadata/{deployment}`.

use async_trait::async_trait;
use kai_vault::VaultClient;
use serde_json::{json, Value};
use tracing::debug;

use super::RecordBackend;
use crate::error::{Result, StorageError};
use crate::record::{parse_version, Record, VERSION_KEY};

const NAME: &str = "vault";

/// Stores records in a Vault KV v2 mount at `secret/`.
#[derive(Debug, Clone)]
pub struct VaultKvBackend {
    client: VaultClient,
    deployment_id: String,
}

impl VaultKvBackend {
    /// Creates a backend for `deployment_id`.
    #[must_use]
    pub fn new(client: VaultClient, deployment_id: impl Into<String>) -> Self {
        Self {
            client,
            deployment_id: deployment_id.into(),
        }
    }

    fn data_path(&self, app: &str, scope: &str) -> String {
        format!("secret/data/{}/{app}/{scope}", self.deployment_id)
    }

    async fn fetch_document(&self, app: &str, scope: &str) -> Result<Option<Value>> {
        let path = self.data_path(app, scope);
        let data = self
            .client
            .read(&path)
            .await
            .map_err(|e| StorageError::backend(NAME, e))?;

        // KV v2 wraps the payload as {"data": {...}, "metadata": {...}}; a
        // deleted version reports `data: null`.
        Ok(data
            .and_then(|mut d| d.get_mut("data").map(Value::take))
            .filter(|d| !d.is_null()))
    }
}

#[async_trait]
impl RecordBackend for VaultKvBackend {
    fn name(&self) -> &'static str {
        NAME
    }

    async fn fetch(&self, app: &str, scope: &str) -> Result<Option<Record>> {
        self.fetch_document(app, scope)
            .await?
            .map(Record::from_json)
            .transpose()
    }

    async fn fetch_version(&self, app: &str, scope: &str) -> Result<Option<i64>> {
        let Some(doc) = self.fetch_document(app, scope).await? else {
            return Ok(None);
        };
        doc.get(VERSION_KEY)
            .map_or(Ok(0), parse_version)
            .map(Some)
    }

    async fn store(&self, app: &str, scope: &str, record: &Record) -> Result<()> {
        let path = self.data_path(app, scope);
        debug!(app, scope, version = record.version, "writing vault record");
        self.client
            .write(&path, &json!({ "data": record.to_document() }))
            .await
            .map_err(|e| StorageError::backend(NAME, e))?;
        Ok(())
    }

    async fn list_app_names(&self) -> Result<Vec<String>> {
        let keys = self
            .client
            .list(&format!("secret/metadata/{}", self.deployment_id))
            .await
            .map_err(|e| StorageError::backend(NAME, e))?;

        Ok(keys
            .into_iter()
            .map(|k| k.trim_end_matches('/').to_string())
            .filter(|k| !k.is_empty())
            .collect())
    }
}
