//! KFILE materialization.

use std::io;
use std::path::Path;

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use kai_env::Env;
use tokio::fs::{DirBuilder, OpenOptions};
use tokio::io::AsyncWriteExt;
use tracing::{debug, error, warn};

/// Mode of directories created for KFILEs.
pub const DIR_MODE: u32 = 0o750;
/// Mode of written KFILEs.
pub const FILE_MODE: u32 = 0o640;

async fn write_file(path: &Path, contents: &[u8]) -> io::Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        DirBuilder::new()
            .recursive(true)
            .mode(DIR_MODE)
            .create(parent)
            .await?;
    }

    let mut file = OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .mode(FILE_MODE)
        .open(path)
        .await?;
    file.write_all(contents).await?;
    file.flush().await
}

/// Writes every file of `env`. Returns how many were written.
///
/// Files without a path, undecodable content and I/O failures are logged
/// and skipped; the child still starts.
pub async fn materialize_files(env: &Env, decode_base64: bool) -> usize {
    let mut written = 0;

    for (name, file) in &env.files {
        if file.path.is_empty() {
            warn!(name = %name, "KFILE has content but no path");
            continue;
        }

        let contents = if decode_base64 {
            match STANDARD.decode(file.content.trim()) {
                Ok(bytes) => bytes,
                Err(e) => {
                    error!(name = %name, path = %file.path, error = %e, "failed to decode KFILE content");
                    continue;
                }
            }
        } else {
            file.content.clone().into_bytes()
        };

        match write_file(Path::new(&file.path), &contents).await {
            Ok(()) => {
                debug!(name = %name, path = %file.path, bytes = contents.len(), "KFILE written");
                written += 1;
            }
            Err(e) => error!(name = %name, path = %file.path, error = %e, "failed to write KFILE"),
        }
    }

    written
}
