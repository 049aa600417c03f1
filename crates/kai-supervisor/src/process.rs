//! Child process plumbing: stopping it and feeding its stdin.

use std::io;
use std::process::ExitStatus;
use std::sync::Arc;

use kai_logstream::LineReader;
use nix::sys::signal::{kill, Signal};
use nix::unistd::Pid;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::{Child, ChildStdin};
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::state::TerminationMode;

/// Supervisor stdin, shared by the children of successive runs.
pub type SharedStdin = Arc<Mutex<BufReader<LineReader>>>;

/// Stops `child` and collects its exit status.
pub async fn terminate(child: &mut Child, mode: TerminationMode) -> io::Result<ExitStatus> {
    match mode {
        TerminationMode::Kill => {
            child.start_kill()?;
            child.wait().await
        }
        TerminationMode::Interrupt { grace } => {
            if let Some(pid) = child.id().and_then(|id| i32::try_from(id).ok()) {
                if let Err(e) = kill(Pid::from_raw(pid), Signal::SIGTERM) {
                    warn!(pid, error = %e, "failed to send SIGTERM");
                }
            }

            if let Ok(status) = tokio::time::timeout(grace, child.wait()).await {
                return status;
            }

            warn!(grace = ?grace, "child ignored SIGTERM, killing");
            child.start_kill()?;
            child.wait().await
        }
    }
}

/// Copies `source` into the child's stdin line by line until EOF, the child
/// closes its end, or `stop` fires. The child's stdin is closed on return.
pub async fn forward_stdin(source: SharedStdin, mut sink: ChildStdin, stop: CancellationToken) {
    let mut source = source.lock().await;
    let mut line = Vec::new();

    loop {
        line.clear();
        let read = tokio::select! {
            () = stop.cancelled() => break,
            read = source.read_until(b'\n', &mut line) => read,
        };

        match read {
            Ok(0) => {
                info!("reached EOF on stdin");
                break;
            }
            Ok(_) => {
                if let Err(e) = sink.write_all(&line).await {
                    debug!(error = %e, "child stdin closed");
                    break;
                }
            }
            Err(e) => {
                warn!(error = %e, "failed to read stdin");
                break;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::os::unix::process::ExitStatusExt;
    use std::process::Stdio;
    use std::time::Duration;
    use tokio::process::Command;

    fn sh(script: &str) -> Child {
        Command::new("/bin/sh")
            .arg("-c")
            .arg(script)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .expect("spawn")
    }

    #[tokio::test]
    async fn kill_is_immediate() {
        let mut child = sh("sleep 30");
        let status = terminate(&mut child, TerminationMode::Kill)
            .await
            .expect("terminate");
        assert_eq!(status.signal(), Some(9));
    }

    #[tokio::test]
    async fn interrupt_lets_the_child_exit_cleanly() {
        let mut child = sh("trap 'exit 7' TERM; while true; do sleep 0.05; done");
        // Give the shell time to install its trap.
        tokio::time::sleep(Duration::from_millis(200)).await;

        let status = terminate(
            &mut child,
            TerminationMode::Interrupt {
                grace: Duration::from_secs(5),
            },
        )
        .await
        .expect("terminate");
        assert_eq!(status.code(), Some(7));
    }

    #[tokio::test]
    async fn interrupt_escalates_after_grace() {
        let mut child = sh("trap '' TERM; while true; do sleep 0.05; done");
        tokio::time::sleep(Duration::from_millis(200)).await;

        let status = terminate(
            &mut child,
            TerminationMode::Interrupt {
                grace: Duration::from_millis(200),
            },
        )
        .await
        .expect("terminate");
        assert_eq!(status.signal(), Some(9));
    }

    #[tokio::test]
    async fn stdin_lines_reach_the_child() {
        let mut child = sh("read a; read b; echo \"$b-$a\"");
        let sink = child.stdin.take().expect("stdin");
        let source: SharedStdin = Arc::new(Mutex::new(BufReader::new(
            Box::new(&b"first\nsecond\n"[..]) as LineReader
        )));

        forward_stdin(source, sink, CancellationToken::new()).await;
        let output = child.wait_with_output().await.expect("output");
        assert_eq!(String::from_utf8_lossy(&output.stdout), "second-first\n");
    }
}
