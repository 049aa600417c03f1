//! `kai save`.

use std::io::Write;
use std::path::Path;

use kai_storage::{save, SecretsFile, Storage};
use tracing::info;

use crate::error::Result;

/// Imports a secrets file produced by `kai dump`.
pub struct SaveCommand<'a> {
    storage: &'a dyn Storage,
}

impl<'a> SaveCommand<'a> {
    /// Creates a save command handler.
    #[must_use]
    pub const fn new(storage: &'a dyn Storage) -> Self {
        Self { storage }
    }

    /// Writes every (app, scope) of `file` to storage.
    pub async fn execute<W: Write>(&self, out: &mut W, file: &Path) -> Result<()> {
        let content = tokio::fs::read_to_string(file).await?;
        let secrets = SecretsFile::from_yaml(&content)?;
        save(self.storage, &secrets).await?;

        let count: usize = secrets
            .secrets
            .values()
            .flat_map(|app| app.scopes.values())
            .map(|entries| entries.len())
            .sum();
        info!(path = %file.display(), "secrets saved");
        writeln!(out, "saved {count} entries from {}", file.display())?;
        Ok(())
    }
}
