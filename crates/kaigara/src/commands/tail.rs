//! `kai tail`.

use std::io::Write;

use futures::StreamExt;
use kai_config::KaigaraConfig;
use kai_logstream::{LogMessage, RedisLogStream};
use tracing::info;

use crate::error::{CliError, Result};

fn format_message(msg: &LogMessage, show_channel: bool) -> String {
    if show_channel {
        format!("{}: {}", msg.channel, msg.payload)
    } else {
        msg.payload.clone()
    }
}

/// Follows log lines published by supervisors.
pub struct TailCommand<'a> {
    config: &'a KaigaraConfig,
}

impl<'a> TailCommand<'a> {
    /// Creates a tail command handler.
    #[must_use]
    pub const fn new(config: &'a KaigaraConfig) -> Self {
        Self { config }
    }

    /// Prints every message on channels matching `pattern` until the
    /// subscription ends.
    pub async fn execute<W: Write>(
        &self,
        out: &mut W,
        pattern: &str,
        show_channel: bool,
    ) -> Result<()> {
        let url = self
            .config
            .redis_url
            .as_deref()
            .filter(|u| !u.is_empty())
            .ok_or(CliError::RedisRequired("tail"))?;

        let stream = RedisLogStream::connect(url).await?;
        let mut messages = stream.subscribe(pattern).await?;
        info!(pattern, "following log channels");

        while let Some(msg) = messages.next().await {
            writeln!(out, "{}", format_message(&msg, show_channel))?;
            out.flush()?;
        }
        Ok(())
    }
}
