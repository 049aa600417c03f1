//! Secret drift detection.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use kai_storage::{Storage, StorageError, GLOBAL_APP};
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// A record whose stored version moved away from the loaded one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Drift {
    /// App name.
    pub app: String,
    /// Scope.
    pub scope: String,
    /// Version the child was started with.
    pub current: i64,
    /// Version now in storage.
    pub latest: i64,
}

impl fmt::Display for Drift {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}/{} changed from v{} to v{}",
            self.app, self.scope, self.current, self.latest
        )
    }
}

/// Every (app, scope) pair to watch: `app_names` plus `global` unless
/// `ignore_global` is set.
#[must_use]
pub fn drift_targets(
    app_names: &[String],
    scopes: &[String],
    ignore_global: bool,
) -> Vec<(String, String)> {
    let mut apps: Vec<&str> = app_names.iter().map(String::as_str).collect();
    if !ignore_global && !apps.contains(&GLOBAL_APP) {
        apps.push(GLOBAL_APP);
    }

    apps.iter()
        .flat_map(|app| scopes.iter().map(move |scope| ((*app).to_string(), scope.clone())))
        .collect()
}

/// Compares loaded and stored versions of every target, stopping at the
/// first difference.
pub async fn check_drift(
    storage: &dyn Storage,
    targets: &[(String, String)],
) -> Result<Option<Drift>, StorageError> {
    for (app, scope) in targets {
        let current = storage.current_version(app, scope)?;
        let latest = storage.latest_version(app, scope).await?;
        if current != latest {
            return Ok(Some(Drift {
                app: app.clone(),
                scope: scope.clone(),
                current,
                latest,
            }));
        }
    }
    Ok(None)
}

/// Checks for drift every `interval` until one is found or `stop` fires.
///
/// A failed check is logged and retried on the next tick.
pub async fn poll_drift(
    storage: Arc<dyn Storage>,
    targets: Vec<(String, String)>,
    interval: Duration,
    stop: CancellationToken,
) -> Option<Drift> {
    let mut ticker = interval_at(Instant::now() + interval, interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            () = stop.cancelled() => return None,
            _ = ticker.tick() => {}
        }

        match check_drift(storage.as_ref(), &targets).await {
            Ok(Some(drift)) => return Some(drift),
            Ok(None) => debug!(targets = targets.len(), "no drift"),
            Err(e) => warn!(error = %e, "drift check failed"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kai_crypto::PlaintextEncryptor;
    use kai_storage::{MemoryBackend, SecretStore};

    fn strings(items: &[&str]) -> Vec<String> {
        items.iter().map(ToString::to_string).collect()
    }

    fn store(backend: &MemoryBackend) -> SecretStore<MemoryBackend> {
        SecretStore::new("dev", backend.clone(), Arc::new(PlaintextEncryptor::new()))
    }

    async fn bump(s: &dyn Storage, app: &str, scope: &str, value: &str) {
        s.read(app, scope).await.expect("read");
        s.set_entry(app, scope, "key", value.into()).await.expect("set");
        s.write(app, scope).await.expect("write");
    }

    #[test]
    fn targets_include_global_last() {
        let targets = drift_targets(&strings(&["api"]), &strings(&["public", "secret"]), false);
        assert_eq!(
            targets,
            vec![
                ("api".to_string(), "public".to_string()),
                ("api".to_string(), "secret".to_string()),
                ("global".to_string(), "public".to_string()),
                ("global".to_string(), "secret".to_string()),
            ]
        );
    }

    #[test]
    fn targets_can_ignore_global() {
        let targets = drift_targets(&strings(&["api", "worker"]), &strings(&["public"]), true);
        assert_eq!(targets.len(), 2);
        assert!(targets.iter().all(|(app, _)| app != "global"));
    }

    #[test]
    fn global_is_not_duplicated() {
        let targets = drift_targets(&strings(&["global"]), &strings(&["public"]), false);
        assert_eq!(targets.len(), 1);
    }

    #[tokio::test]
    async fn detects_external_write() {
        let backend = MemoryBackend::new();
        let watcher = store(&backend);
        let writer = store(&backend);

        bump(&writer, "api", "public", "v0").await;
        watcher.read("api", "public").await.expect("read");

        let targets = vec![("api".to_string(), "public".to_string())];
        assert_eq!(check_drift(&watcher, &targets).await.expect("check"), None);

        bump(&writer, "api", "public", "v1").await;
        let drift = check_drift(&watcher, &targets)
            .await
            .expect("check")
            .expect("drift");
        assert_eq!(drift.current, 0);
        assert_eq!(drift.latest, 1);
        assert_eq!(drift.to_string(), "api/public changed from v0 to v1");
    }

    #[tokio::test]
    async fn unloaded_targets_are_errors() {
        let backend = MemoryBackend::new();
        let watcher = store(&backend);
        let targets = vec![("api".to_string(), "public".to_string())];
        assert!(check_drift(&watcher, &targets).await.is_err());
    }

    #[tokio::test]
    async fn poller_stops_when_cancelled() {
        let backend = MemoryBackend::new();
        let watcher: Arc<dyn Storage> = Arc::new(store(&backend));
        let stop = CancellationToken::new();
        stop.cancel();

        let found = poll_drift(watcher, Vec::new(), Duration::from_millis(10), stop).await;
        assert_eq!(found, None);
    }

    #[tokio::test]
    async fn poller_survives_failed_checks() {
        let backend = MemoryBackend::new();
        let watcher = Arc::new(store(&backend));
        let writer = store(&backend);
        let targets = vec![("api".to_string(), "public".to_string())];

        let poller = tokio::spawn(poll_drift(
            Arc::clone(&watcher) as Arc<dyn Storage>,
            targets,
            Duration::from_millis(10),
            CancellationToken::new(),
        ));

        // Not loaded yet: the first ticks fail and are retried.
        tokio::time::sleep(Duration::from_millis(40)).await;
        bump(&writer, "api", "public", "v0").await;
        watcher.read("api", "public").await.expect("read");
        bump(&writer, "api", "public", "v1").await;

        let drift = tokio::time::timeout(Duration::from_secs(5), poller)
            .await
            .expect("in time")
            .expect("join")
            .expect("drift");
        assert_eq!(drift.latest, 1);
    }
}
