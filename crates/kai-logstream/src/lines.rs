//! Line pumping from a child pipe.

use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{debug, warn};

use crate::error::Result;
use crate::{LineReader, LogStream};

fn trim_terminator(mut line: &[u8]) -> &[u8] {
    if let [rest @ .., b'\n'] = line {
        line = rest;
    }
    if let [rest @ .., b'\r'] = line {
        line = rest;
    }
    line
}

/// Reads `reader` to EOF and hands every line to `stream`.
///
/// Invalid UTF-8 is replaced rather than rejected, so a binary burst from the
/// child never stops the pump.
pub(crate) async fn pump_lines<S>(stream: &S, channel: &str, reader: LineReader) -> Result<()>
where
    S: LogStream + ?Sized,
{
    let mut reader = BufReader::new(reader);
    let mut buf = Vec::new();
    let mut published = 0u64;
    let mut failed = 0u64;

    loop {
        buf.clear();
        if reader.read_until(b'\n', &mut buf).await? == 0 {
            break;
        }

        let line = String::from_utf8_lossy(trim_terminator(&buf));
        match stream.publish_line(channel, &line).await {
            Ok(()) => published += 1,
            Err(e) => {
                failed += 1;
                warn!(channel, error = %e, "failed to publish log line");
            }
        }
    }

    debug!(channel, published, failed, "reached end of stream");
    Ok(())
}
