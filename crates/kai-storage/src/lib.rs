//! # kai-storage
//!
//! Versioned, app/scope keyed secret storage.
//!
//! Every (app, scope) pair is an independent [`Record`] with an integer
//! version. A process reads records into a working set, mutates entries in
//! memory and writes them back; each write persists the backend's version
//! plus one. Comparing [`Storage::current_version`] with
//! [`Storage::latest_version`] tells a process that someone else changed its
//! secrets.
//!
//! ## Backends
//!
//! | Backend | Type | Feature |
//! |---|---|---|
//! | Vault KV v2 | [`VaultKvBackend`] | always |
//! | SQL (SQLite / PostgreSQL / MySQL) | [`SqlBackend`] | `sql` |
//! | Kubernetes secrets | [`KubernetesBackend`] | `kubernetes` |
//! | In-process map | [`MemoryBackend`] | always |
//!
//! All of them are wrapped by [`SecretStore`], which applies encryption to
//! the `secret` scope.
//!
//! ## Example
//!
//! ```rust
//! use std::sync::Arc;
//! use kai_crypto::PlaintextEncryptor;
//! use kai_storage::{MemoryBackend, SecretStore, Storage};
//!
//! # tokio::runtime::Runtime::new().unwrap().block_on(async {
//! let store = SecretStore::new("dev", MemoryBackend::new(), Arc::new(PlaintextEncryptor::new()));
//! store.read("api", "public").await.unwrap();
//! store.set_entry("api", "public", "port", 8080i64.into()).await.unwrap();
//! store.write("api", "public").await.unwrap();
//! assert_eq!(store.latest_version("api", "public").await.unwrap(), 0);
//! # });
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod backend;
pub mod error;
pub mod ops;
pub mod record;
pub mod storage;
pub mod store;
pub mod value;

pub use backend::{MemoryBackend, RecordBackend, VaultKvBackend};
#[cfg(feature = "kubernetes")]
pub use backend::KubernetesBackend;
#[cfg(feature = "sql")]
pub use backend::{Dialect, SqlBackend};
pub use error::{Result, StorageError};
pub use ops::{
    clean_all, delete_matching, dump, dump_apps, save, AppSecrets, EntryPattern, SecretsFile,
};
pub use record::{Record, VERSION_KEY};
pub use storage::{Storage, DEFAULT_SCOPES, GLOBAL_APP, SECRET_SCOPE};
pub use store::SecretStore;
pub use value::EntryValue;
