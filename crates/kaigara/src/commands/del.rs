//! `kai del`.

use std::io::Write;

use kai_storage::{delete_matching, Storage};

use crate::error::Result;

/// Deletes entries matching an `app.scope.var` pattern.
pub struct DelCommand<'a> {
    storage: &'a dyn Storage,
}

impl<'a> DelCommand<'a> {
    /// Creates a delete command handler.
    #[must_use]
    pub const fn new(storage: &'a dyn Storage) -> Self {
        Self { storage }
    }

    /// Deletes and prints each removed `app.scope.name`.
    pub async fn execute<W: Write>(&self, out: &mut W, pattern: &str) -> Result<()> {
        for deleted in delete_matching(self.storage, pattern).await? {
            writeln!(out, "deleted {deleted}")?;
        }
        Ok(())
    }
}
