//! `kai dump`.

use std::io::Write;
use std::path::Path;

use kai_config::KaigaraConfig;
use kai_storage::{dump, dump_apps, Storage};
use tracing::info;

use crate::error::Result;

/// Exports every entry, decrypted and without `version`.
pub struct DumpCommand<'a> {
    storage: &'a dyn Storage,
    config: &'a KaigaraConfig,
}

impl<'a> DumpCommand<'a> {
    /// Creates a dump command handler.
    #[must_use]
    pub const fn new(storage: &'a dyn Storage, config: &'a KaigaraConfig) -> Self {
        Self { storage, config }
    }

    /// Prints the secrets file to `out` and writes it to `output`.
    ///
    /// Covers the configured apps, or every stored app when none are
    /// configured.
    pub async fn execute<W: Write>(&self, out: &mut W, output: &Path) -> Result<()> {
        let file = if self.config.app_names.is_empty() {
            dump(self.storage, &self.config.scopes).await?
        } else {
            dump_apps(self.storage, &self.config.app_names, &self.config.scopes).await?
        };

        let rendered = file.to_yaml()?;
        write!(out, "{rendered}")?;
        tokio::fs::write(output, &rendered).await?;

        info!(path = %output.display(), apps = file.secrets.len(), "dump saved");
        Ok(())
    }
}
