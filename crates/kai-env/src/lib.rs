//! # kai-env
//!
//! Flattens stored app/scope entries into a child process environment.
//!
//! [`build_env`] reads `global` first and then every requested app, so
//! app-specific values come later and win when the OS resolves duplicates.
//! Keys are exported upper-cased. Two conventions are special:
//!
//! - `version` is bookkeeping and never exported
//! - `KFILE_<NAME>_PATH` / `KFILE_<NAME>_CONTENT` pairs describe a file to
//!   write instead of a variable, collected in [`Env::files`]

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod coerce;
pub mod compose;
pub mod error;

pub use coerce::{value_to_env_string, CompositeMode};
pub use compose::{build_env, collect_entries, BuildOptions, Env, EnvFile, RESERVED_PREFIX};
pub use error::{EnvError, Result};
