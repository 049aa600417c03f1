//! Liveness heartbeat.

use std::time::Duration;

use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::error::Result;
use crate::{service_key, LogStream};

/// Timing of the liveness key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HeartbeatConfig {
    /// Time to live set on the key.
    pub ttl: Duration,
    /// Interval between refreshes. Must be shorter than `ttl`.
    pub refresh: Duration,
}

impl Default for HeartbeatConfig {
    fn default() -> Self {
        Self {
            ttl: Duration::from_secs(20),
            refresh: Duration::from_secs(10),
        }
    }
}

/// Sets the key, refreshes it every `refresh` until `cancel` fires, then
/// deletes it. Set and refresh failures are logged; only the final delete
/// is reported.
pub(crate) async fn run_heartbeat<S>(stream: &S, name: &str, cancel: CancellationToken) -> Result<()>
where
    S: LogStream + ?Sized,
{
    let config = stream.heartbeat_config();
    let key = service_key(name);

    match stream.mark_alive(&key, config.ttl).await {
        Ok(()) => debug!(key = %key, ttl = ?config.ttl, "heartbeat started"),
        Err(e) => warn!(key = %key, error = %e, "failed to set heartbeat key"),
    }

    let mut ticker = interval_at(Instant::now() + config.refresh, config.refresh);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            () = cancel.cancelled() => break,
            _ = ticker.tick() => {
                if let Err(e) = stream.refresh_alive(&key, config.ttl).await {
                    warn!(key = %key, error = %e, "failed to refresh heartbeat key");
                }
            }
        }
    }

    debug!(key = %key, "heartbeat stopped");
    stream.clear_alive(&key).await
}
