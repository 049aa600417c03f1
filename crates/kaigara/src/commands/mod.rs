//! `kai` subcommand implementations.
//!
//! - [`dump`] - export decrypted entries to a secrets file
//! - [`save`] - import a secrets file
//! - [`del`] - delete entries by pattern
//! - [`env`] - print the merged environment
//! - [`tail`] - follow published log lines

pub mod del;
pub mod dump;
pub mod env;
pub mod save;
pub mod tail;

pub use del::DelCommand;
pub use dump::DumpCommand;
pub use env::EnvCommand;
pub use save::SaveCommand;
pub use tail::TailCommand;
