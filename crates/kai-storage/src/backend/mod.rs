//! Persistence backends.
//!
//! A [`RecordBackend`] only knows how to move whole records in and out of
//! one deployment namespace. Encryption, the working set and version
//! arithmetic live in [`crate::SecretStore`].

use async_trait::async_trait;

use crate::error::Result;
use crate::record::Record;

pub mod memory;
pub mod vault;

#[cfg(feature = "kubernetes")]
pub mod kubernetes;
#[cfg(feature = "sql")]
pub mod sql;

pub use memory::MemoryBackend;
pub use vault::VaultKvBackend;

#[cfg(feature = "kubernetes")]
pub use kubernetes::KubernetesBackend;
#[cfg(feature = "sql")]
pub use sql::{Dialect, SqlBackend};

/// Whole-record persistence for one deployment namespace.
#[async_trait]
pub trait RecordBackend: Send + Sync {
    /// Short backend name used in logs and errors.
    fn name(&self) -> &'static str;

    /// Fetches the record for (app, scope), or `None` if it was never written.
    async fn fetch(&self, app: &str, scope: &str) -> Result<Option<Record>>;

    /// Fetches only the stored version.
    async fn fetch_version(&self, app: &str, scope: &str) -> Result<Option<i64>>;

    /// Stores `record` in a single call, replacing any previous copy.
    async fn store(&self, app: &str, scope: &str, record: &Record) -> Result<()>;

    /// Names of the apps with at least one stored record.
    async fn list_app_names(&self) -> Result<Vec<String>>;
}

/// Lower-cases `s` and replaces underscores with dashes.
pub(crate) fn dash_case(s: &str) -> String {
    s.to_lowercase().replace('_', "-")
}
