//! Storage properties that must hold for every backend.
//!
//! Each property runs against the in-memory backend and against SQLite
//! through the SQL backend.

use std::sync::Arc;

use kai_crypto::{Encryptor, PlaintextEncryptor, SymmetricEncryptor};
use kai_storage::{
    EntryValue, MemoryBackend, RecordBackend, SecretStore, SqlBackend, Storage, StorageError,
};
use proptest::prelude::*;

// ============================================================================
// Fixtures
// ============================================================================

fn symmetric() -> Arc<dyn Encryptor> {
    Arc::new(SymmetricEncryptor::new(b"kaigara-test-key-32-bytes-long!!").expect("key"))
}

async fn sql_backend() -> SqlBackend {
    SqlBackend::connect("sqlite::memory:", 1, "test")
        .await
        .expect("sqlite")
}

/// Two stores sharing one backend, as two processes would.
fn pair<B: RecordBackend + Clone>(backend: &B) -> (SecretStore<B>, SecretStore<B>) {
    (
        SecretStore::new("test", backend.clone(), symmetric()),
        SecretStore::new("test", backend.clone(), symmetric()),
    )
}

// ============================================================================
// Properties
// ============================================================================

async fn check_version_monotonicity(s: &dyn Storage) {
    s.read("app", "public").await.expect("read");
    for expected in 0..5i64 {
        s.write("app", "public").await.expect("write");
        assert_eq!(s.latest_version("app", "public").await.expect("latest"), expected);
    }
}

async fn check_secret_roundtrip(writer: &dyn Storage, reader: &dyn Storage) {
    writer.read("app", "secret").await.expect("read");
    writer
        .set_entry("app", "secret", "token", "s3cr3t value".into())
        .await
        .expect("set");
    writer.write("app", "secret").await.expect("write");

    reader.read("app", "secret").await.expect("read");
    assert_eq!(
        reader.get_entry("app", "secret", "token").await.expect("get"),
        Some(EntryValue::from("s3cr3t value"))
    );
}

async fn check_deletion(writer: &dyn Storage, reader: &dyn Storage) {
    writer.read("app", "private").await.expect("read");
    writer
        .set_entry("app", "private", "gone", "soon".into())
        .await
        .expect("set");
    writer.write("app", "private").await.expect("write");
    writer.delete_entry("app", "private", "gone").expect("delete");
    writer.write("app", "private").await.expect("write");

    reader.read("app", "private").await.expect("read");
    assert!(!reader
        .get_entries("app", "private")
        .await
        .expect("entries")
        .contains_key("gone"));
}

async fn check_drift_visibility(mine: &dyn Storage, theirs: &dyn Storage) {
    mine.read("drift", "public").await.expect("read");
    assert_eq!(
        mine.current_version("drift", "public").expect("current"),
        mine.latest_version("drift", "public").await.expect("latest")
    );

    theirs.read("drift", "public").await.expect("read");
    theirs
        .set_entry("drift", "public", "k", "v".into())
        .await
        .expect("set");
    theirs.write("drift", "public").await.expect("write");

    assert_ne!(
        mine.current_version("drift", "public").expect("current"),
        mine.latest_version("drift", "public").await.expect("latest")
    );
}

#[tokio::test]
async fn memory_backend_properties() {
    let backend = MemoryBackend::new();
    let (a, b) = pair(&backend);
    check_version_monotonicity(&a).await;
    check_secret_roundtrip(&a, &b).await;
    check_deletion(&a, &b).await;
    check_drift_visibility(&a, &b).await;
}

#[tokio::test]
async fn sql_backend_properties() {
    let backend = sql_backend().await;
    let (a, b) = pair(&backend);
    check_version_monotonicity(&a).await;
    check_secret_roundtrip(&a, &b).await;
    check_deletion(&a, &b).await;
    check_drift_visibility(&a, &b).await;

    assert_eq!(
        a.list_app_names().await.expect("apps"),
        vec!["app", "drift"]
    );
}

#[tokio::test]
async fn sqlite_file_outlives_the_connection() {
    let dir = tempfile::tempdir().expect("tempdir");
    let url = format!("sqlite://{}?mode=rwc", dir.path().join("kaigara.db").display());

    let first = SecretStore::new(
        "test",
        SqlBackend::connect(&url, 1, "test").await.expect("sqlite"),
        symmetric(),
    );
    first.read("app", "secret").await.expect("read");
    first
        .set_entry("app", "secret", "token", "kept".into())
        .await
        .expect("set");
    first.write("app", "secret").await.expect("write");
    drop(first);

    let second = SecretStore::new(
        "test",
        SqlBackend::connect(&url, 1, "test").await.expect("reconnect"),
        symmetric(),
    );
    second.read("app", "secret").await.expect("read");
    assert_eq!(second.current_version("app", "secret").expect("version"), 0);
    assert_eq!(
        second.get_entry("app", "secret", "token").await.expect("get"),
        Some(EntryValue::from("kept"))
    );
}

#[tokio::test]
async fn plaintext_encryptor_persists_secrets_verbatim() {
    let backend = MemoryBackend::new();
    let s = SecretStore::new("test", backend.clone(), Arc::new(PlaintextEncryptor::new()));
    s.read("app", "secret").await.expect("read");
    s.set_entry("app", "secret", "k", "visible".into())
        .await
        .expect("set");
    s.write("app", "secret").await.expect("write");

    let raw = backend.raw("app", "secret").expect("stored");
    assert_eq!(raw.entries.get("k"), Some(&EntryValue::from("visible")));

    s.read("app", "secret").await.expect("read");
    let err = s
        .set_entry("app", "secret", "k", "".into())
        .await
        .expect_err("empty value");
    assert!(matches!(err, StorageError::Encryption(_)));
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn secrets_never_persist_as_plaintext(value in "[ -~]{1,64}") {
        let rt = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .expect("runtime");

        let backend = MemoryBackend::new();
        let (writer, reader) = pair(&backend);

        let read_back = rt.block_on(async {
            writer.read("app", "secret").await?;
            writer.set_entry("app", "secret", "v", value.clone().into()).await?;
            writer.write("app", "secret").await?;
            reader.read("app", "secret").await?;
            reader.get_entry("app", "secret", "v").await
        }).expect("roundtrip");

        let raw = backend.raw("app", "secret").expect("stored");
        prop_assert_ne!(raw.entries.get("v"), Some(&EntryValue::from(value.as_str())));
        prop_assert_eq!(read_back, Some(EntryValue::from(value.as_str())));
    }
}
