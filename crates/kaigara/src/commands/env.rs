//! `kai env`.

use std::io::Write;

use kai_config::KaigaraConfig;
use kai_env::collect_entries;
use kai_storage::{EntryValue, Storage};

use crate::error::{CliError, Result};

/// Renders a value for display. Strings are quoted when `quote` is set;
/// lists and maps are printed as JSON.
fn render(value: &EntryValue, quote: bool) -> String {
    match value {
        EntryValue::String(s) if quote => format!("\"{s}\""),
        EntryValue::String(s) => s.clone(),
        EntryValue::Bool(b) => b.to_string(),
        EntryValue::Number(n) => n.to_string(),
        EntryValue::List(_) | EntryValue::Map(_) => {
            serde_json::to_string(value).unwrap_or_default()
        }
    }
}

/// Prints the merged entries of the configured apps and scopes.
pub struct EnvCommand<'a> {
    storage: &'a dyn Storage,
    config: &'a KaigaraConfig,
}

impl<'a> EnvCommand<'a> {
    /// Creates an env command handler.
    #[must_use]
    pub const fn new(storage: &'a dyn Storage, config: &'a KaigaraConfig) -> Self {
        Self { storage, config }
    }

    /// Without `name`, prints `NAME=value` lines (strings quoted). With it,
    /// prints the raw value of that entry.
    pub async fn execute<W: Write>(&self, out: &mut W, name: Option<&str>) -> Result<()> {
        self.config.require_app_names()?;
        let entries =
            collect_entries(&self.config.app_names, &self.config.scopes, self.storage).await?;

        match name {
            None => {
                for (key, value) in &entries {
                    writeln!(out, "{key}={}", render(value, true))?;
                }
            }
            Some(name) => {
                let value = entries
                    .get(&name.to_uppercase())
                    .ok_or_else(|| CliError::UnknownKey(name.to_string()))?;
                write!(out, "{}", render(value, false))?;
            }
        }
        Ok(())
    }
}
