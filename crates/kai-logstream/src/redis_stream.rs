//! Redis transport: Pub/Sub for lines, expiring keys for liveness.

use std::time::Duration;

use async_trait::async_trait;
use futures::stream::{BoxStream, StreamExt};
use redis::aio::MultiplexedConnection;
use tracing::{debug, info, warn};

use crate::console::echo_line;
use crate::error::Result;
use crate::heartbeat::HeartbeatConfig;
use crate::LogStream;

/// Pattern `kai tail` subscribes to by default.
pub const DEFAULT_TAIL_PATTERN: &str = "log.*";

/// A message received from a subscription.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogMessage {
    /// Channel the message was published on.
    pub channel: String,
    /// Message body.
    pub payload: String,
}

/// Publishes lines with `PUBLISH` and keeps liveness keys with
/// `SET .. EX` / `EXPIRE` / `DEL`.
#[derive(Clone)]
pub struct RedisLogStream {
    client: redis::Client,
    conn: MultiplexedConnection,
    echo: bool,
    heartbeat: HeartbeatConfig,
}

impl RedisLogStream {
    /// Opens a multiplexed connection to `url` and checks it with `PING`.
    pub async fn connect(url: &str) -> Result<Self> {
        let client = redis::Client::open(url)?;
        let mut conn = client.get_multiplexed_async_connection().await?;
        let _: String = redis::cmd("PING").query_async(&mut conn).await?;
        info!("connected to redis");

        Ok(Self {
            client,
            conn,
            echo: false,
            heartbeat: HeartbeatConfig::default(),
        })
    }

    /// Also writes every published line to the supervisor's own output.
    #[must_use]
    pub fn with_echo(mut self, echo: bool) -> Self {
        self.echo = echo;
        self
    }

    /// Overrides the heartbeat timing.
    #[must_use]
    pub fn with_heartbeat(mut self, config: HeartbeatConfig) -> Self {
        self.heartbeat = config;
        self
    }

    /// Subscribes to every channel matching `pattern` (`PSUBSCRIBE`).
    ///
    /// Messages with a non-UTF-8 payload are dropped.
    pub async fn subscribe(&self, pattern: &str) -> Result<BoxStream<'static, LogMessage>> {
        let mut pubsub = self.client.get_async_connection().await?.into_pubsub();
        pubsub.psubscribe(pattern).await?;
        debug!(pattern, "subscribed");

        let messages = pubsub.into_on_message().filter_map(|msg| async move {
            match msg.get_payload::<String>() {
                Ok(payload) => Some(LogMessage {
                    channel: msg.get_channel_name().to_string(),
                    payload,
                }),
                Err(e) => {
                    warn!(channel = msg.get_channel_name(), error = %e, "dropping message");
                    None
                }
            }
        });
        Ok(messages.boxed())
    }
}

impl std::fmt::Debug for RedisLogStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedisLogStream")
            .field("echo", &self.echo)
            .field("heartbeat", &self.heartbeat)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl LogStream for RedisLogStream {
    async fn publish_line(&self, channel: &str, line: &str) -> Result<()> {
        if self.echo {
            echo_line(channel, line)?;
        }
        let mut conn = self.conn.clone();
        let _: () = redis::cmd("PUBLISH")
            .arg(channel)
            .arg(line)
            .query_async(&mut conn)
            .await?;
        Ok(())
    }

    async fn mark_alive(&self, key: &str, ttl: Duration) -> Result<()> {
        let mut conn = self.conn.clone();
        let _: () = redis::cmd("SET")
            .arg(key)
            .arg(chrono::Utc::now().to_rfc3339())
            .arg("EX")
            .arg(ttl.as_secs().max(1))
            .query_async(&mut conn)
            .await?;
        Ok(())
    }

    async fn refresh_alive(&self, key: &str, ttl: Duration) -> Result<()> {
        let mut conn = self.conn.clone();
        let _: () = redis::cmd("EXPIRE")
            .arg(key)
            .arg(ttl.as_secs().max(1))
            .query_async(&mut conn)
            .await?;
        Ok(())
    }

    async fn clear_alive(&self, key: &str) -> Result<()> {
        let mut conn = self.conn.clone();
        let _: () = redis::cmd("DEL").arg(key).query_async(&mut conn).await?;
        Ok(())
    }

    fn heartbeat_config(&self) -> HeartbeatConfig {
        self.heartbeat
    }
}
