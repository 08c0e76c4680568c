//! Filesystem helpers for artifacts and session records.

use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncWriteExt;

use crate::error::MediaResult;

/// EXDEV on Linux and macOS.
const CROSS_DEVICE_ERRNO: i32 = 18;

/// Move `src` to `dst`, falling back to copy+delete across filesystems.
///
/// The destination directory is created if needed. In the fallback path the
/// copy lands next to `dst` first and is renamed into place.
pub async fn move_file(src: impl AsRef<Path>, dst: impl AsRef<Path>) -> MediaResult<()> {
    let src = src.as_ref();
    let dst = dst.as_ref();

    ensure_parent(dst).await?;

    match fs::rename(src, dst).await {
        Ok(()) => Ok(()),
        Err(e) if e.raw_os_error() == Some(CROSS_DEVICE_ERRNO) => {
            tracing::debug!(
                src = %src.display(),
                dst = %dst.display(),
                "Cross-device rename, copying instead"
            );
            let staging = sibling_with_suffix(dst, "moving");
            fs::copy(src, &staging).await?;
            if let Err(e) = fs::rename(&staging, dst).await {
                let _ = fs::remove_file(&staging).await;
                return Err(e.into());
            }
            if let Err(e) = fs::remove_file(src).await {
                tracing::warn!(src = %src.display(), "Failed to remove moved source: {}", e);
            }
            Ok(())
        }
        Err(e) => Err(e.into()),
    }
}

/// Write `bytes` to `path` via `<path>.tmp` and a rename.
///
/// Readers see either the previous content or the new one, never a partial
/// file.
pub async fn write_atomic(path: impl AsRef<Path>, bytes: &[u8]) -> MediaResult<()> {
    let path = path.as_ref();
    ensure_parent(path).await?;

    let tmp = sibling_with_suffix(path, "tmp");
    let mut file = fs::File::create(&tmp).await?;
    file.write_all(bytes).await?;
    file.sync_all().await?;
    drop(file);

    if let Err(e) = fs::rename(&tmp, path).await {
        let _ = fs::remove_file(&tmp).await;
        return Err(e.into());
    }
    Ok(())
}

/// Remove a file, treating "already gone" as success.
pub async fn remove_if_exists(path: impl AsRef<Path>) -> MediaResult<bool> {
    match fs::remove_file(path.as_ref()).await {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(e.into()),
    }
}

/// `session.json` -> `session.json.tmp`
pub fn sibling_with_suffix(path: &Path, suffix: &str) -> PathBuf {
    let mut name = path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    name.push(".");
    name.push(suffix);
    path.with_file_name(name)
}

async fn ensure_parent(path: &Path) -> MediaResult<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            fs::create_dir_all(parent).await?;
        }
    }
    Ok(())
}
