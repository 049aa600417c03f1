//! Bulk operations over a whole deployment.
//!
//! These back the `kai` operator commands: dumping every record to a
//! [`SecretsFile`], loading one back, and deleting entries by pattern.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::{Result, StorageError};
use crate::record::VERSION_KEY;
use crate::storage::{Storage, DEFAULT_SCOPES, GLOBAL_APP};
use crate::value::EntryValue;

/// Entries of one app, grouped by scope.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AppSecrets {
    /// scope -> entry name -> value
    #[serde(default)]
    pub scopes: BTreeMap<String, BTreeMap<String, EntryValue>>,
}

/// Portable dump of a deployment's entries (plaintext), kept as YAML.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SecretsFile {
    /// app -> scopes
    #[serde(default)]
    pub secrets: BTreeMap<String, AppSecrets>,
}

impl SecretsFile {
    /// Parses a secrets file. JSON input is accepted as well.
    pub fn from_yaml(input: &str) -> Result<Self> {
        Ok(serde_yaml::from_str(input)?)
    }

    /// Renders the file as YAML.
    pub fn to_yaml(&self) -> Result<String> {
        Ok(serde_yaml::to_string(self)?)
    }
}

/// Reads every app known to the backend, for each of `scopes`.
///
/// Secret values come out decrypted; scopes without entries are omitted.
pub async fn dump(storage: &dyn Storage, scopes: &[String]) -> Result<SecretsFile> {
    let apps = storage.list_app_names().await?;
    dump_apps(storage, &apps, scopes).await
}

/// Like [`dump`], restricted to `apps`.
pub async fn dump_apps(
    storage: &dyn Storage,
    apps: &[String],
    scopes: &[String],
) -> Result<SecretsFile> {
    let mut file = SecretsFile::default();

    for app in apps {
        let mut app_secrets = AppSecrets::default();
        for scope in scopes {
            storage.read(app, scope).await?;
            let entries = storage.get_entries(app, scope).await?;
            if !entries.is_empty() {
                app_secrets.scopes.insert(scope.clone(), entries);
            }
        }
        file.secrets.insert(app.clone(), app_secrets);
    }

    Ok(file)
}

/// Writes every (app, scope) of `file` to storage.
///
/// Entries are merged into what is already stored; a `"version"` key in the
/// input is ignored.
pub async fn save(storage: &dyn Storage, file: &SecretsFile) -> Result<()> {
    for (app, app_secrets) in &file.secrets {
        for (scope, entries) in &app_secrets.scopes {
            storage.read(app, scope).await?;
            for (name, value) in entries {
                if name == VERSION_KEY {
                    continue;
                }
                info!(app = %app, scope = %scope, name = %name, "setting entry");
                storage.set_entry(app, scope, name, value.clone()).await?;
            }
            storage.write(app, scope).await?;
        }
    }
    Ok(())
}

/// Removes every entry of `apps` (plus `global`) in `scopes` and writes the
/// now-empty records.
pub async fn clean_all(storage: &dyn Storage, apps: &[String], scopes: &[String]) -> Result<()> {
    let mut apps = apps.to_vec();
    if !apps.iter().any(|a| a == GLOBAL_APP) {
        apps.push(GLOBAL_APP.to_string());
    }

    for app in &apps {
        for scope in scopes {
            storage.read(app, scope).await?;
            for name in storage.list_entries(app, scope)? {
                storage.delete_entry(app, scope, &name)?;
            }
            storage.write(app, scope).await?;
        }
    }
    Ok(())
}

/// Pattern segment keyword matching everything.
pub const ALL: &str = "all";

/// A parsed `app.scope.var` deletion pattern.
///
/// Any segment may be `all`. `all` scopes means the three default scopes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntryPattern {
    /// App name or `all`.
    pub app: String,
    /// Scope or `all`.
    pub scope: String,
    /// Entry name or `all`.
    pub name: String,
}

impl EntryPattern {
    /// Parses `app.scope.var`.
    pub fn parse(pattern: &str) -> Result<Self> {
        let parts: Vec<&str> = pattern.split('.').collect();
        match parts.as_slice() {
            [app, scope, name] if !app.is_empty() && !scope.is_empty() && !name.is_empty() => {
                Ok(Self {
                    app: (*app).to_string(),
                    scope: (*scope).to_string(),
                    name: (*name).to_string(),
                })
            }
            _ => Err(StorageError::InvalidPattern {
                pattern: pattern.to_string(),
            }),
        }
    }

    fn scopes(&self) -> Vec<String> {
        if self.scope == ALL {
            DEFAULT_SCOPES.iter().map(ToString::to_string).collect()
        } else {
            vec![self.scope.clone()]
        }
    }
}

impl fmt::Display for EntryPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.app, self.scope, self.name)
    }
}

/// Deletes the entries matched by an `app.scope.var` pattern and writes the
/// touched records. Returns the deleted `app.scope.name` triples.
pub async fn delete_matching(storage: &dyn Storage, pattern: &str) -> Result<Vec<String>> {
    let pattern = EntryPattern::parse(pattern)?;

    let apps = if pattern.app == ALL {
        storage.list_app_names().await?
    } else {
        vec![pattern.app.clone()]
    };

    let mut deleted = Vec::new();
    for app in &apps {
        for scope in pattern.scopes() {
            storage.read(app, &scope).await?;

            let names = if pattern.name == ALL {
                storage.list_entries(app, &scope)?
            } else {
                vec![pattern.name.clone()]
            };

            for name in names {
                storage.delete_entry(app, &scope, &name)?;
                info!(app = %app, scope = %scope, name = %name, "deleted entry");
                deleted.push(format!("{app}.{scope}.{name}"));
            }

            storage.write(app, &scope).await?;
        }
    }

    Ok(deleted)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::MemoryBackend;
    use crate::store::SecretStore;
    use kai_crypto::SymmetricEncryptor;
    use serde_json::json;
    use std::sync::Arc;
    use test_case::test_case;

    fn store(backend: &MemoryBackend) -> SecretStore<MemoryBackend> {
        let enc = SymmetricEncryptor::new(&[9u8; 32]).expect("key");
        SecretStore::new("dev", backend.clone(), Arc::new(enc))
    }

    fn scopes() -> Vec<String> {
        DEFAULT_SCOPES.iter().map(ToString::to_string).collect()
    }

    async fn seed(s: &dyn Storage, app: &str, scope: &str, entries: &[(&str, &str)]) {
        s.read(app, scope).await.expect("read");
        for (k, v) in entries {
            s.set_entry(app, scope, k, (*v).into()).await.expect("set");
        }
        s.write(app, scope).await.expect("write");
    }

    #[test_case("app.public.key" ; "explicit")]
    #[test_case("all.all.all" ; "everything")]
    fn parses_valid_patterns(input: &str) {
        let pattern = EntryPattern::parse(input).expect("parse");
        assert_eq!(pattern.to_string(), input);
    }

    #[test_case("app.public")]
    #[test_case("a.b.c.d")]
    #[test_case("a..c")]
    #[test_case("")]
    fn rejects_invalid_patterns(input: &str) {
        assert!(matches!(
            EntryPattern::parse(input),
            Err(StorageError::InvalidPattern { .. })
        ));
    }

    #[tokio::test]
    async fn dump_then_save_restores_plaintext() {
        let source = MemoryBackend::new();
        let s = store(&source);
        seed(&s, "app1", "public", &[("host", "db")]).await;
        seed(&s, "app1", "secret", &[("password", "hunter2")]).await;
        seed(&s, "global", "private", &[("region", "eu")]).await;

        let file = dump(&s, &scopes()).await.expect("dump");
        let rendered = file.to_yaml().expect("yaml");
        assert!(rendered.contains("hunter2"));
        assert!(!rendered.contains("version"));

        let parsed = SecretsFile::from_yaml(&rendered).expect("parse");
        assert_eq!(parsed, file);

        let target = MemoryBackend::new();
        let t = store(&target);
        save(&t, &parsed).await.expect("save");

        t.read("app1", "secret").await.expect("read");
        assert_eq!(
            t.get_entry("app1", "secret", "password").await.expect("get"),
            Some(EntryValue::from("hunter2"))
        );
        assert_eq!(t.list_app_names().await.expect("apps"), vec!["app1", "global"]);
    }

    #[test]
    fn loads_yaml_written_by_earlier_releases() {
        let input = "\
secrets:
  global:
    scopes:
      public:
        key: value
        port: 8080
        debug: true
  peatio:
    scopes:
      secret:
        db_password: changeme
      private:
        brokers:
          - kafka-1
          - kafka-2
";
        let file = SecretsFile::from_yaml(input).expect("yaml");

        let global = &file.secrets["global"].scopes["public"];
        assert_eq!(global["key"], EntryValue::from("value"));
        assert_eq!(global["port"], EntryValue::from(8080i64));
        assert_eq!(global["debug"], EntryValue::from(true));

        let peatio = &file.secrets["peatio"].scopes;
        assert_eq!(peatio["secret"]["db_password"], EntryValue::from("changeme"));
        assert!(peatio["private"]["brokers"].is_composite());
    }

    #[test]
    fn loads_json_secrets_files() {
        let file = SecretsFile::from_yaml(r#"{"secrets": {"app": {"scopes": {"public": {"k": "v"}}}}}"#)
            .expect("json is yaml");
        assert_eq!(file.secrets["app"].scopes["public"]["k"], EntryValue::from("v"));
    }

    #[test]
    fn rejects_malformed_secrets_file() {
        assert!(matches!(
            SecretsFile::from_yaml("secrets: [not, a, map]"),
            Err(StorageError::Yaml(_))
        ));
    }

    #[tokio::test]
    async fn dump_apps_limits_the_dump() {
        let backend = MemoryBackend::new();
        let s = store(&backend);
        seed(&s, "one", "public", &[("a", "1")]).await;
        seed(&s, "two", "public", &[("b", "2")]).await;

        let file = dump_apps(&s, &["two".to_string()], &scopes()).await.expect("dump");
        assert_eq!(file.secrets.keys().collect::<Vec<_>>(), vec!["two"]);
    }

    #[tokio::test]
    async fn save_ignores_version_key() {
        let backend = MemoryBackend::new();
        let s = store(&backend);
        let file: SecretsFile = serde_json::from_value(json!({
            "secrets": {"app": {"scopes": {"public": {"version": 42, "k": "v"}}}}
        }))
        .expect("file");

        save(&s, &file).await.expect("save");
        let raw = backend.raw("app", "public").expect("stored");
        assert_eq!(raw.version, 0);
        assert_eq!(raw.entries.len(), 1);
    }

    #[tokio::test]
    async fn clean_all_includes_global() {
        let backend = MemoryBackend::new();
        let s = store(&backend);
        seed(&s, "app", "public", &[("a", "1")]).await;
        seed(&s, "global", "public", &[("g", "1")]).await;

        clean_all(&s, &["app".to_string()], &["public".to_string()])
            .await
            .expect("clean");

        assert!(backend.raw("app", "public").expect("app").entries.is_empty());
        assert!(backend.raw("global", "public").expect("global").entries.is_empty());
    }

    #[tokio::test]
    async fn delete_single_entry() {
        let backend = MemoryBackend::new();
        let s = store(&backend);
        seed(&s, "app", "public", &[("a", "1"), ("b", "2")]).await;

        let deleted = delete_matching(&s, "app.public.a").await.expect("delete");
        assert_eq!(deleted, vec!["app.public.a"]);

        let raw = backend.raw("app", "public").expect("stored");
        assert_eq!(raw.entries.keys().collect::<Vec<_>>(), vec!["b"]);
        assert_eq!(raw.version, 1);
    }

    #[tokio::test]
    async fn delete_all_everywhere() {
        let backend = MemoryBackend::new();
        let s = store(&backend);
        seed(&s, "one", "public", &[("a", "1")]).await;
        seed(&s, "two", "secret", &[("b", "2")]).await;

        let mut deleted = delete_matching(&s, "all.all.all").await.expect("delete");
        deleted.sort();
        assert_eq!(deleted, vec!["one.public.a", "two.secret.b"]);

        for (app, scope) in [("one", "public"), ("two", "secret")] {
            assert!(backend.raw(app, scope).expect("stored").entries.is_empty());
        }
    }
}
