//! # kai-supervisor
//!
//! Runs a command with its secrets in the environment and keeps it honest.
//!
//! A [`Supervisor`] composes the environment from storage, writes KFILEs,
//! starts the child with a clean environment and then, while it runs:
//!
//! - forwards its own stdin to the child
//! - publishes the child's stdout and stderr on `log.{apps}.{stream}`
//! - keeps a `service.{apps}` heartbeat alive
//! - polls storage and stops the child when a record it was started with
//!   has a newer version
//!
//! With `restart_on_drift` a drift stop is followed by a fresh child built
//! from the new secrets; otherwise [`Supervisor::run`] returns.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod drift;
pub mod error;
pub mod files;
pub mod process;
pub mod state;
pub mod supervisor;

pub use drift::{check_drift, drift_targets, poll_drift, Drift};
pub use error::{Result, SupervisorError};
pub use files::materialize_files;
pub use process::terminate;
pub use state::{RunOutcome, SupervisorState, Termination, TerminationMode};
pub use supervisor::{process_env, split_env, OpaqueEnv, Supervisor, SupervisorConfig};
