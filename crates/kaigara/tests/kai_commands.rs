//! `kai` subcommands against in-memory storage.

use std::sync::Arc;

use kai_config::{EncryptorKind, KaigaraConfig, StorageDriver};
use kai_storage::{EntryValue, Storage};
use kaigara::commands::{DelCommand, DumpCommand, EnvCommand, SaveCommand};
use kaigara::factory::{encryptor_from_config, storage_from_config};
use kaigara::CliError;
use tempfile::TempDir;

fn config(apps: &[&str]) -> KaigaraConfig {
    KaigaraConfig {
        deployment_id: "test".to_string(),
        app_names: apps.iter().map(ToString::to_string).collect(),
        storage: StorageDriver::Memory,
        encryptor: EncryptorKind::Aes,
        encryptor_key: Some("0123456789abcdef0123456789abcdef".to_string()),
        ..KaigaraConfig::default()
    }
}

async fn storage(config: &KaigaraConfig) -> Arc<dyn Storage> {
    let enc = encryptor_from_config(config).await.expect("encryptor");
    storage_from_config(config, enc).await.expect("storage")
}

async fn seed(s: &dyn Storage, app: &str, scope: &str, entries: &[(&str, EntryValue)]) {
    s.read(app, scope).await.expect("read");
    for (k, v) in entries {
        s.set_entry(app, scope, k, v.clone()).await.expect("set");
    }
    s.write(app, scope).await.expect("write");
}

fn output(buf: Vec<u8>) -> String {
    String::from_utf8(buf).expect("utf-8")
}

#[tokio::test]
async fn dump_then_save_into_another_deployment() {
    let dir = TempDir::new().expect("tempdir");
    let path = dir.path().join("outputs.yaml");

    let source_config = config(&[]);
    let source = storage(&source_config).await;
    seed(source.as_ref(), "peatio", "public", &[("host", "db".into())]).await;
    seed(source.as_ref(), "peatio", "secret", &[("password", "hunter2".into())]).await;

    let mut out = Vec::new();
    DumpCommand::new(source.as_ref(), &source_config)
        .execute(&mut out, &path)
        .await
        .expect("dump");
    let printed = output(out);
    assert!(printed.contains("hunter2"));
    assert_eq!(std::fs::read_to_string(&path).expect("file"), printed);

    let target_config = config(&[]);
    let target = storage(&target_config).await;
    let mut out = Vec::new();
    SaveCommand::new(target.as_ref())
        .execute(&mut out, &path)
        .await
        .expect("save");
    assert!(output(out).starts_with("saved 2 entries"));

    target.read("peatio", "secret").await.expect("read");
    assert_eq!(
        target
            .get_entry("peatio", "secret", "password")
            .await
            .expect("get"),
        Some("hunter2".into())
    );
}

#[tokio::test]
async fn dump_limits_to_configured_apps() {
    let dir = TempDir::new().expect("tempdir");
    let path = dir.path().join("outputs.yaml");

    let config = config(&["barong"]);
    let s = storage(&config).await;
    seed(s.as_ref(), "peatio", "public", &[("a", "1".into())]).await;
    seed(s.as_ref(), "barong", "public", &[("b", "2".into())]).await;

    let mut out = Vec::new();
    DumpCommand::new(s.as_ref(), &config)
        .execute(&mut out, &path)
        .await
        .expect("dump");
    let printed = output(out);
    assert!(printed.contains("barong"));
    assert!(!printed.contains("peatio"));
}

#[tokio::test]
async fn save_loads_a_hand_written_yaml_file() {
    let dir = TempDir::new().expect("tempdir");
    let path = dir.path().join("outputs.yaml");
    std::fs::write(
        &path,
        "secrets:\n  global:\n    scopes:\n      public:\n        key: value\n      secret:\n        token: s3cr3t\n",
    )
    .expect("write");

    let config = config(&[]);
    let s = storage(&config).await;
    let mut out = Vec::new();
    SaveCommand::new(s.as_ref())
        .execute(&mut out, &path)
        .await
        .expect("save");
    assert!(output(out).starts_with("saved 2 entries"));

    s.read("global", "secret").await.expect("read");
    assert_eq!(
        s.get_entry("global", "secret", "token").await.expect("get"),
        Some("s3cr3t".into())
    );
}

#[tokio::test]
async fn save_rejects_missing_file() {
    let config = config(&[]);
    let s = storage(&config).await;
    let err = SaveCommand::new(s.as_ref())
        .execute(&mut Vec::new(), std::path::Path::new("/nonexistent/outputs.yaml"))
        .await
        .expect_err("missing");
    assert!(matches!(err, CliError::Io(_)));
}

#[tokio::test]
async fn del_reports_deleted_entries() {
    let config = config(&[]);
    let s = storage(&config).await;
    seed(s.as_ref(), "peatio", "secret", &[("a", "1".into()), ("b", "2".into())]).await;

    let mut out = Vec::new();
    DelCommand::new(s.as_ref())
        .execute(&mut out, "peatio.secret.all")
        .await
        .expect("del");
    assert_eq!(output(out), "deleted peatio.secret.a\ndeleted peatio.secret.b\n");

    s.read("peatio", "secret").await.expect("reload");
    assert!(s.list_entries("peatio", "secret").expect("list").is_empty());
}

#[tokio::test]
async fn del_rejects_bad_pattern() {
    let config = config(&[]);
    let s = storage(&config).await;
    let err = DelCommand::new(s.as_ref())
        .execute(&mut Vec::new(), "peatio.secret")
        .await
        .expect_err("bad pattern");
    assert!(matches!(err, CliError::Storage(_)));
}

#[tokio::test]
async fn env_lists_and_looks_up() {
    let config = config(&["finex"]);
    let s = storage(&config).await;
    seed(
        s.as_ref(),
        "finex",
        "private",
        &[("finex_log_level", "debug".into()), ("finex_workers", 4i64.into())],
    )
    .await;
    seed(s.as_ref(), "finex", "secret", &[("finex_license_key", "abc".into())]).await;

    let mut out = Vec::new();
    EnvCommand::new(s.as_ref(), &config)
        .execute(&mut out, None)
        .await
        .expect("env");
    assert_eq!(
        output(out),
        "FINEX_LICENSE_KEY=\"abc\"\nFINEX_LOG_LEVEL=\"debug\"\nFINEX_WORKERS=4\n"
    );

    let mut out = Vec::new();
    EnvCommand::new(s.as_ref(), &config)
        .execute(&mut out, Some("finex_log_level"))
        .await
        .expect("env");
    assert_eq!(output(out), "debug");

    let err = EnvCommand::new(s.as_ref(), &config)
        .execute(&mut Vec::new(), Some("missing"))
        .await
        .expect_err("unknown");
    assert!(matches!(err, CliError::UnknownKey(_)));
}

#[tokio::test]
async fn env_requires_app_names() {
    let config = config(&[]);
    let s = storage(&config).await;
    let err = EnvCommand::new(s.as_ref(), &config)
        .execute(&mut Vec::new(), None)
        .await
        .expect_err("no apps");
    assert!(matches!(err, CliError::Config(_)));
}
