//! Lifecycle states and run results.

use std::fmt;
use std::os::unix::process::ExitStatusExt;
use std::process::ExitStatus;
use std::time::Duration;

/// Where the supervisor is in its lifecycle.
///
/// `Building → Starting → Running → (Exited | Killed)`, then either
/// `Restarting → Building` or `Done`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SupervisorState {
    /// Composing the environment and writing files.
    Building,
    /// Spawning the child.
    Starting,
    /// Child running, background tasks active.
    Running,
    /// Child exited on its own.
    Exited,
    /// Child stopped by the supervisor.
    Killed,
    /// About to start a fresh child after drift.
    Restarting,
    /// Finished; [`crate::Supervisor::run`] is returning.
    Done,
}

impl fmt::Display for SupervisorState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Building => "building",
            Self::Starting => "starting",
            Self::Running => "running",
            Self::Exited => "exited",
            Self::Killed => "killed",
            Self::Restarting => "restarting",
            Self::Done => "done",
        })
    }
}

/// How the supervisor stops a child.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TerminationMode {
    /// SIGKILL.
    #[default]
    Kill,
    /// SIGTERM, then SIGKILL if the child outlives `grace`.
    Interrupt {
        /// Time allowed for a clean exit.
        grace: Duration,
    },
}

/// Why the last child stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Termination {
    /// It exited on its own.
    Exited,
    /// Its secrets changed in storage and it was stopped.
    Drift,
    /// The supervisor was asked to shut down and stopped it.
    Shutdown,
}

impl fmt::Display for Termination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Exited => "exited",
            Self::Drift => "drift",
            Self::Shutdown => "shutdown",
        })
    }
}

/// Result of [`crate::Supervisor::run`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunOutcome {
    /// Exit status of the last child, when one was collected.
    pub exit_status: Option<ExitStatus>,
    /// Number of drift restarts.
    pub restarts: u32,
    /// Why the last child stopped.
    pub last_termination: Termination,
}

impl RunOutcome {
    /// Shell-style exit code: the child's code, or 128 + signal number.
    #[must_use]
    pub fn exit_code(&self) -> i32 {
        match self.exit_status {
            Some(status) => status
                .code()
                .or_else(|| status.signal().map(|s| 128 + s))
                .unwrap_or(1),
            None => 1,
        }
    }
}
