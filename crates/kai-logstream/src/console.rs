//! Echo-only transport, used when no Redis URL is configured.

use std::io::Write;
use std::time::Duration;

use async_trait::async_trait;

use crate::error::Result;
use crate::{LogStream, OutputStream};

/// Writes a line to the supervisor's own stdout or stderr, following the
/// channel's suffix.
pub(crate) fn echo_line(channel: &str, line: &str) -> Result<()> {
    if channel.ends_with(OutputStream::Stderr.as_str()) {
        let mut err = std::io::stderr().lock();
        writeln!(err, "{line}")?;
    } else {
        let mut out = std::io::stdout().lock();
        writeln!(out, "{line}")?;
        out.flush()?;
    }
    Ok(())
}

/// Echoes child output; heartbeats are no-ops.
#[derive(Debug, Clone, Copy, Default)]
pub struct ConsoleLogStream;

impl ConsoleLogStream {
    /// Creates the console stream.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

#[async_trait]
impl LogStream for ConsoleLogStream {
    async fn publish_line(&self, channel: &str, line: &str) -> Result<()> {
        echo_line(channel, line)
    }

    async fn mark_alive(&self, _key: &str, _ttl: Duration) -> Result<()> {
        Ok(())
    }

    async fn refresh_alive(&self, _key: &str, _ttl: Duration) -> Result<()> {
        Ok(())
    }

    async fn clear_alive(&self, _key: &str) -> Result<()> {
        Ok(())
    }
}
