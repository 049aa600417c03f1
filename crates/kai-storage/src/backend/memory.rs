//! In-memory backend.

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::RwLock;

use super::RecordBackend;
use crate::error::Result;
use crate::record::Record;

type Records = HashMap<(String, String), Record>;

/// Keeps records in a process-local map.
///
/// Clones share the same map, so two stores built from clones of one backend
/// observe each other's writes like two processes sharing a database.
#[derive(Debug, Clone, Default)]
pub struct MemoryBackend {
    records: Arc<RwLock<Records>>,
}

impl MemoryBackend {
    /// Creates an empty backend.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the raw stored record, bypassing any store.
    #[must_use]
    pub fn raw(&self, app: &str, scope: &str) -> Option<Record> {
        self.records
            .read()
            .get(&(app.to_string(), scope.to_string()))
            .cloned()
    }

    /// Number of stored records.
    #[must_use]
    pub fn len(&self) -> usize {
        self.records.read().len()
    }

    /// Returns true if nothing was stored yet.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.read().is_empty()
    }
}

#[async_trait]
impl RecordBackend for MemoryBackend {
    fn name(&self) -> &'static str {
        "memory"
    }

    async fn fetch(&self, app: &str, scope: &str) -> Result<Option<Record>> {
        Ok(self.raw(app, scope))
    }

    async fn fetch_version(&self, app: &str, scope: &str) -> Result<Option<i64>> {
        Ok(self
            .records
            .read()
            .get(&(app.to_string(), scope.to_string()))
            .map(|r| r.version))
    }

    async fn store(&self, app: &str, scope: &str, record: &Record) -> Result<()> {
        self.records
            .write()
            .insert((app.to_string(), scope.to_string()), record.clone());
        Ok(())
    }

    async fn list_app_names(&self) -> Result<Vec<String>> {
        let names: BTreeSet<String> = self
            .records
            .read()
            .keys()
            .map(|(app, _)| app.clone())
            .collect();
        Ok(names.into_iter().collect())
    }
}
