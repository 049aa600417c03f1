//! Kubernetes `Secret` backend.
//!
//! Each record is one `Secret` named `kaigara-{app}-{scope}` in the
//! namespace named after the deployment. Entry values are JSON-encoded data
//! keys; `version` is a decimal string.

use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

use async_trait::async_trait;
use k8s_openapi::api::core::v1::Secret;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use k8s_openapi::ByteString;
use kube::api::{Api, ListParams, PostParams};
use kube::config::{KubeConfigOptions, Kubeconfig};
use kube::{Client, Config};
use serde_json::Value;
use tracing::{debug, instrument};

use super::{dash_case, RecordBackend};
use crate::error::{Result, StorageError};
use crate::record::{Record, VERSION_KEY};
use crate::value::EntryValue;

const NAME: &str = "kubernetes";

/// Label marking secrets owned by kaigara.
pub const MANAGED_BY_LABEL: &str = "app.kubernetes.io/managed-by";
/// Label carrying the app name.
pub const APP_LABEL: &str = "kaigara.io/app";
/// Label carrying the scope.
pub const SCOPE_LABEL: &str = "kaigara.io/scope";

fn kube_err(e: impl std::fmt::Display) -> StorageError {
    StorageError::backend(NAME, e)
}

/// Name of the secret holding (app, scope).
#[must_use]
pub fn secret_name(app: &str, scope: &str) -> String {
    format!("kaigara-{}-{}", dash_case(app), dash_case(scope))
}

/// Stores records as Kubernetes secrets.
#[derive(Clone)]
pub struct KubernetesBackend {
    client: Client,
    namespace: String,
}

impl KubernetesBackend {
    /// Creates a backend for `deployment_id` on an existing client.
    #[must_use]
    pub fn new(client: Client, deployment_id: &str) -> Self {
        Self {
            client,
            namespace: dash_case(deployment_id),
        }
    }

    /// Builds a client from `kubeconfig`, or from the in-cluster / default
    /// configuration when no path is given.
    pub async fn connect(kubeconfig: Option<&Path>, deployment_id: &str) -> Result<Self> {
        let client = match kubeconfig {
            Some(path) => {
                let kc = Kubeconfig::read_from(path).map_err(kube_err)?;
                let config = Config::from_custom_kubeconfig(kc, &KubeConfigOptions::default())
                    .await
                    .map_err(kube_err)?;
                Client::try_from(config).map_err(kube_err)?
            }
            None => Client::try_default().await.map_err(kube_err)?,
        };
        debug!(namespace = %dash_case(deployment_id), "kubernetes client initialized");
        Ok(Self::new(client, deployment_id))
    }

    fn secrets(&self) -> Api<Secret> {
        Api::namespaced(self.client.clone(), &self.namespace)
    }

    async fn get(&self, app: &str, scope: &str) -> Result<Option<Secret>> {
        self.secrets()
            .get_opt(&secret_name(app, scope))
            .await
            .map_err(kube_err)
    }
}

impl std::fmt::Debug for KubernetesBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KubernetesBackend")
            .field("namespace", &self.namespace)
            .finish_non_exhaustive()
    }
}

/// Builds the secret object for a record.
#[must_use]
pub fn record_to_secret(namespace: &str, app: &str, scope: &str, record: &Record) -> Secret {
    let mut data: BTreeMap<String, ByteString> = record
        .entries
        .iter()
        .map(|(k, v)| {
            let encoded = serde_json::to_vec(v).unwrap_or_default();
            (k.clone(), ByteString(encoded))
        })
        .collect();
    data.insert(
        VERSION_KEY.to_string(),
        ByteString(record.version.to_string().into_bytes()),
    );

    let labels = BTreeMap::from([
        (MANAGED_BY_LABEL.to_string(), "kaigara".to_string()),
        (APP_LABEL.to_string(), app.to_string()),
        (SCOPE_LABEL.to_string(), scope.to_string()),
    ]);

    Secret {
        metadata: ObjectMeta {
            name: Some(secret_name(app, scope)),
            namespace: Some(namespace.to_string()),
            labels: Some(labels),
            ..ObjectMeta::default()
        },
        data: Some(data),
        type_: Some("Opaque".to_string()),
        ..Secret::default()
    }
}

/// Parses a record out of a secret's data.
pub fn secret_to_record(secret: &Secret) -> Result<Record> {
    let mut record = Record::default();
    let Some(data) = &secret.data else {
        return Ok(record);
    };

    for (key, ByteString(bytes)) in data {
        let text = std::str::from_utf8(bytes).map_err(|e| StorageError::InvalidRecord {
            reason: format!("{key} is not utf-8: {e}"),
        })?;

        if key == VERSION_KEY {
            record.version = text.trim().parse().map_err(|_| StorageError::InvalidRecord {
                reason: format!("version {text:?} is not an integer"),
            })?;
            continue;
        }

        // Values written by hand may be bare strings rather than JSON.
        let value = match serde_json::from_str::<Value>(text) {
            Ok(Value::Null) | Err(_) => EntryValue::String(text.to_string()),
            Ok(v) => EntryValue::try_from(v)?,
        };
        record.entries.insert(key.clone(), value);
    }

    Ok(record)
}

#[async_trait]
impl RecordBackend for KubernetesBackend {
    fn name(&self) -> &'static str {
        NAME
    }

    #[instrument(skip(self))]
    async fn fetch(&self, app: &str, scope: &str) -> Result<Option<Record>> {
        self.get(app, scope)
            .await?
            .map(|s| secret_to_record(&s))
            .transpose()
    }

    #[instrument(skip(self))]
    async fn fetch_version(&self, app: &str, scope: &str) -> Result<Option<i64>> {
        Ok(self.fetch(app, scope).await?.map(|r| r.version))
    }

    #[instrument(skip(self, record), fields(version = record.version))]
    async fn store(&self, app: &str, scope: &str, record: &Record) -> Result<()> {
        let api = self.secrets();
        let mut secret = record_to_secret(&self.namespace, app, scope, record);

        match self.get(app, scope).await? {
            Some(existing) => {
                secret.metadata.resource_version = existing.metadata.resource_version;
                api.replace(&secret_name(app, scope), &PostParams::default(), &secret)
                    .await
                    .map_err(kube_err)?;
            }
            None => {
                api.create(&PostParams::default(), &secret)
                    .await
                    .map_err(kube_err)?;
            }
        }
        Ok(())
    }

    #[instrument(skip(self))]
    async fn list_app_names(&self) -> Result<Vec<String>> {
        let params = ListParams::default().labels(&format!("{MANAGED_BY_LABEL}=kaigara"));
        let secrets = self.secrets().list(&params).await.map_err(kube_err)?;

        let names: BTreeSet<String> = secrets
            .items
            .iter()
            .filter_map(|s| s.metadata.labels.as_ref()?.get(APP_LABEL).cloned())
            .collect();
        Ok(names.into_iter().collect())
    }
}
