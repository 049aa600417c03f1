//! The storage contract shared by every backend.

use std::collections::BTreeMap;

use async_trait::async_trait;

use crate::error::Result;
use crate::record::VERSION_KEY;
use crate::value::EntryValue;

/// Scope whose entries are encrypted at rest.
pub const SECRET_SCOPE: &str = "secret";

/// App whose entries are merged into every app's environment.
pub const GLOBAL_APP: &str = "global";

/// The default scope list.
pub const DEFAULT_SCOPES: [&str; 3] = ["public", "private", "secret"];

/// Versioned, app/scope keyed key-value storage with an in-memory working set.
///
/// `read` loads a record into the working set; the entry methods act on the
/// working set only; `write` persists it. `latest_version` is the single
/// query that goes to the backend without touching the working set.
#[async_trait]
pub trait Storage: Send + Sync {
    /// Loads the authoritative record, replacing any cached copy. A missing
    /// record seeds an empty one at version 0.
    async fn read(&self, app: &str, scope: &str) -> Result<()>;

    /// Persists the working set entries under the next version.
    async fn write(&self, app: &str, scope: &str) -> Result<()>;

    /// Sets one entry. Secret-scope values must be strings and are
    /// encrypted before they enter the working set.
    async fn set_entry(&self, app: &str, scope: &str, name: &str, value: EntryValue)
        -> Result<()>;

    /// Returns one entry, decrypted if needed. Absent names yield `None`.
    async fn get_entry(&self, app: &str, scope: &str, name: &str) -> Result<Option<EntryValue>>;

    /// Names of the entries held for (app, scope), without `"version"`.
    fn list_entries(&self, app: &str, scope: &str) -> Result<Vec<String>>;

    /// Removes one entry from the working set.
    fn delete_entry(&self, app: &str, scope: &str, name: &str) -> Result<()>;

    /// Sorted, duplicate-free app names known to the backend.
    async fn list_app_names(&self) -> Result<Vec<String>>;

    /// Version held in the working set.
    fn current_version(&self, app: &str, scope: &str) -> Result<i64>;

    /// Version held by the backend, falling back to the working set version
    /// (or 0) when the record does not exist remotely.
    async fn latest_version(&self, app: &str, scope: &str) -> Result<i64>;

    /// Sets several entries.
    async fn set_entries(
        &self,
        app: &str,
        scope: &str,
        entries: BTreeMap<String, EntryValue>,
    ) -> Result<()> {
        for (name, value) in entries {
            self.set_entry(app, scope, &name, value).await?;
        }
        Ok(())
    }

    /// Returns every entry, decrypted, without `"version"`.
    async fn get_entries(&self, app: &str, scope: &str) -> Result<BTreeMap<String, EntryValue>> {
        let mut out = BTreeMap::new();
        for name in self.list_entries(app, scope)? {
            if name == VERSION_KEY {
                continue;
            }
            if let Some(value) = self.get_entry(app, scope, &name).await? {
                out.insert(name, value);
            }
        }
        Ok(out)
    }
}
