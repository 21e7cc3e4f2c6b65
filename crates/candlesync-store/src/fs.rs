//! Atomic file replacement.

use std::io::Write;
use std::path::{Path, PathBuf};

use crate::StoreError;

/// Replaces `path` with `contents` through a temp file in the same directory.
///
/// Readers observe either the old file or the new one, never a partial write.
pub(crate) async fn replace_file(path: &Path, contents: Vec<u8>) -> crate::Result<()> {
    let target = path.to_path_buf();
    let io_err = |source: std::io::Error| StoreError::Io {
        path: path.to_path_buf(),
        source,
    };

    tokio::task::spawn_blocking(move || write_then_rename(&target, &contents))
        .await
        .map_err(|e| io_err(std::io::Error::other(e)))?
        .map_err(io_err)
}

fn write_then_rename(target: &Path, contents: &[u8]) -> std::io::Result<()> {
    let dir = parent_dir(target);
    std::fs::create_dir_all(&dir)?;

    let mut tmp = tempfile::Builder::new()
        .prefix(".candlesync-")
        .suffix(".tmp")
        .tempfile_in(&dir)?;
    tmp.write_all(contents)?;
    tmp.as_file().sync_all()?;
    tmp.persist(target).map_err(|e| e.error)?;
    Ok(())
}

fn parent_dir(path: &Path) -> PathBuf {
    path.parent()
        .filter(|p| !p.as_os_str().is_empty())
        .map_or_else(|| PathBuf::from("."), Path::to_path_buf)
}
