//! In-memory transport.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::error::{LogStreamError, Result};
use crate::heartbeat::HeartbeatConfig;
use crate::LogStream;

/// A recorded liveness operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HeartbeatEvent {
    /// Key set with a TTL.
    Set {
        /// Key name.
        key: String,
        /// Time to live.
        ttl: Duration,
    },
    /// TTL extended.
    Refresh {
        /// Key name.
        key: String,
    },
    /// Key deleted.
    Clear {
        /// Key name.
        key: String,
    },
}

#[derive(Debug, Default)]
struct Inner {
    lines: HashMap<String, Vec<String>>,
    alive: HashSet<String>,
    events: Vec<HeartbeatEvent>,
}

/// Records published lines and heartbeat operations. Clones share state.
#[derive(Debug, Clone, Default)]
pub struct MemoryLogStream {
    inner: Arc<Mutex<Inner>>,
    heartbeat: HeartbeatConfig,
    fail_publish: bool,
}

impl MemoryLogStream {
    /// Creates an empty stream with the default heartbeat timing.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Overrides the heartbeat timing.
    #[must_use]
    pub fn with_heartbeat(mut self, config: HeartbeatConfig) -> Self {
        self.heartbeat = config;
        self
    }

    /// Makes every publish fail, as a disconnected transport would.
    #[must_use]
    pub fn failing(mut self) -> Self {
        self.fail_publish = true;
        self
    }

    /// Lines published on `channel`, in order.
    #[must_use]
    pub fn lines(&self, channel: &str) -> Vec<String> {
        self.inner
            .lock()
            .lines
            .get(channel)
            .cloned()
            .unwrap_or_default()
    }

    /// Channels that received at least one line.
    #[must_use]
    pub fn channels(&self) -> Vec<String> {
        let mut channels: Vec<String> = self.inner.lock().lines.keys().cloned().collect();
        channels.sort();
        channels
    }

    /// Whether `key` is currently set.
    #[must_use]
    pub fn is_alive(&self, key: &str) -> bool {
        self.inner.lock().alive.contains(key)
    }

    /// Every heartbeat operation so far.
    #[must_use]
    pub fn events(&self) -> Vec<HeartbeatEvent> {
        self.inner.lock().events.clone()
    }
}

#[async_trait]
impl LogStream for MemoryLogStream {
    async fn publish_line(&self, channel: &str, line: &str) -> Result<()> {
        if self.fail_publish {
            return Err(LogStreamError::StreamClosed);
        }
        self.inner
            .lock()
            .lines
            .entry(channel.to_string())
            .or_default()
            .push(line.to_string());
        Ok(())
    }

    async fn mark_alive(&self, key: &str, ttl: Duration) -> Result<()> {
        let mut inner = self.inner.lock();
        inner.alive.insert(key.to_string());
        inner.events.push(HeartbeatEvent::Set {
            key: key.to_string(),
            ttl,
        });
        Ok(())
    }

    async fn refresh_alive(&self, key: &str, _ttl: Duration) -> Result<()> {
        self.inner.lock().events.push(HeartbeatEvent::Refresh {
            key: key.to_string(),
        });
        Ok(())
    }

    async fn clear_alive(&self, key: &str) -> Result<()> {
        let mut inner = self.inner.lock();
        inner.alive.remove(key);
        inner.events.push(HeartbeatEvent::Clear {
            key: key.to_string(),
        });
        Ok(())
    }

    fn heartbeat_config(&self) -> HeartbeatConfig {
        self.heartbeat
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn publish_splits_lines() {
        let stream = MemoryLogStream::new();
        stream
            .publish("log.app.stdout", Box::new(&b"first\r\nsecond\n\nlast"[..]))
            .await
            .expect("publish");

        assert_eq!(
            stream.lines("log.app.stdout"),
            vec!["first", "second", "", "last"]
        );
        assert!(stream.lines("log.app.stderr").is_empty());
    }

    #[tokio::test]
    async fn invalid_utf8_is_replaced() {
        let stream = MemoryLogStream::new();
        stream
            .publish("c", Box::new(&b"ok\n\xff\xfe\n"[..]))
            .await
            .expect("publish");

        let lines = stream.lines("c");
        assert_eq!(lines[0], "ok");
        assert!(lines[1].contains('\u{fffd}'));
    }

    #[tokio::test]
    async fn publish_failures_do_not_stop_the_pump() {
        let stream = MemoryLogStream::new().failing();
        stream
            .publish("c", Box::new(&b"a\nb\nc\n"[..]))
            .await
            .expect("pipe drained");
        assert!(stream.channels().is_empty());
    }

    #[tokio::test]
    async fn publishes_from_a_live_pipe() {
        let stream = MemoryLogStream::new();
        let (mut writer, reader) = tokio::io::duplex(64);

        let pump = {
            let stream = stream.clone();
            tokio::spawn(async move { stream.publish("log.x.stderr", Box::new(reader)).await })
        };

        tokio::io::AsyncWriteExt::write_all(&mut writer, b"partial ")
            .await
            .expect("write");
        tokio::io::AsyncWriteExt::write_all(&mut writer, b"line\nnext\n")
            .await
            .expect("write");
        drop(writer);

        pump.await.expect("join").expect("publish");
        assert_eq!(stream.lines("log.x.stderr"), vec!["partial line", "next"]);
    }
}
