//! # kaigara
//!
//! The two Kaigara binaries and the wiring they share.
//!
//! - `kaigara CMD [ARGS...]` runs `CMD` under a
//!   [`kai_supervisor::Supervisor`]: secrets in its environment, output on
//!   the log stream, restart or exit on secret drift
//! - `kai` is the operator CLI: `dump`, `save`, `del`, `env` and `tail`
//!
//! Both read a [`kai_config::KaigaraConfig`] and build their storage,
//! encryptor and log stream through [`factory`].

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod cli;
pub mod commands;
pub mod error;
pub mod factory;
pub mod telemetry;

pub use cli::{KaiCli, KaiCommands, KaigaraCli};
pub use error::{CliError, Result};
