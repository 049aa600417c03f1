//! # kai-logstream
//!
//! Transport for the supervised child's output and for its liveness key.
//!
//! A [`LogStream`] is a small set of primitives (publish one line, set /
//! refresh / clear a key with a TTL). Line pumping and the heartbeat loop are
//! provided on top of them, so every transport behaves the same way:
//!
//! - [`LogStream::publish`] reads a pipe until EOF and publishes each line;
//!   a failed publish is logged and the pipe keeps draining
//! - [`LogStream::heartbeat`] sets `service.{name}`, refreshes it until the
//!   token is cancelled and then deletes it
//!
//! Transports: [`RedisLogStream`] (Pub/Sub plus keys), [`ConsoleLogStream`]
//! (echo only) and [`MemoryLogStream`] (records everything, for tests).

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod console;
pub mod error;
pub mod heartbeat;
pub mod lines;
pub mod memory;
pub mod redis_stream;

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use tokio::io::AsyncRead;
use tokio_util::sync::CancellationToken;

pub use console::ConsoleLogStream;
pub use error::{LogStreamError, Result};
pub use heartbeat::HeartbeatConfig;
pub use memory::{HeartbeatEvent, MemoryLogStream};
pub use redis_stream::{LogMessage, RedisLogStream, DEFAULT_TAIL_PATTERN};

/// Boxed pipe handed to [`LogStream::publish`].
pub type LineReader = Box<dyn AsyncRead + Send + Unpin>;

/// Which output of the child a channel carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OutputStream {
    /// Standard output.
    Stdout,
    /// Standard error.
    Stderr,
}

impl OutputStream {
    /// Channel suffix.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Stdout => "stdout",
            Self::Stderr => "stderr",
        }
    }
}

impl fmt::Display for OutputStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Name a group of apps is logged under: the names joined by `&`.
#[must_use]
pub fn logging_name(app_names: &[String]) -> String {
    app_names.join("&")
}

/// `log.{apps joined by &}.{stdout|stderr}`
#[must_use]
pub fn channel_name(app_names: &[String], stream: OutputStream) -> String {
    format!("log.{}.{stream}", logging_name(app_names))
}

/// Liveness key of a service.
#[must_use]
pub fn service_key(name: &str) -> String {
    format!("service.{name}")
}

/// A destination for log lines and liveness keys.
#[async_trait]
pub trait LogStream: Send + Sync {
    /// Publishes a single line (without its terminator) on `channel`.
    async fn publish_line(&self, channel: &str, line: &str) -> Result<()>;

    /// Sets `key` with the given time to live.
    async fn mark_alive(&self, key: &str, ttl: Duration) -> Result<()>;

    /// Extends the time to live of `key`.
    async fn refresh_alive(&self, key: &str, ttl: Duration) -> Result<()>;

    /// Removes `key`.
    async fn clear_alive(&self, key: &str) -> Result<()>;

    /// Timing used by [`LogStream::heartbeat`].
    fn heartbeat_config(&self) -> HeartbeatConfig {
        HeartbeatConfig::default()
    }

    /// Streams `reader` line by line to `channel` until EOF.
    ///
    /// Only a read failure is returned; publish failures are logged.
    async fn publish(&self, channel: &str, reader: LineReader) -> Result<()> {
        lines::pump_lines(self, channel, reader).await
    }

    /// Keeps `service.{name}` alive until `cancel` fires, then deletes it.
    async fn heartbeat(&self, name: &str, cancel: CancellationToken) -> Result<()> {
        heartbeat::run_heartbeat(self, name, cancel).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn apps(names: &[&str]) -> Vec<String> {
        names.iter().map(ToString::to_string).collect()
    }

    #[test]
    fn channels_join_app_names() {
        assert_eq!(
            channel_name(&apps(&["peatio"]), OutputStream::Stdout),
            "log.peatio.stdout"
        );
        assert_eq!(
            channel_name(&apps(&["peatio", "barong"]), OutputStream::Stderr),
            "log.peatio&barong.stderr"
        );
    }

    #[test]
    fn service_keys() {
        assert_eq!(service_key("peatio&barong"), "service.peatio&barong");
    }
}
