//! Filesystem helpers for scene artifacts.

use std::path::{Path, PathBuf};
use tokio::fs;
use uuid::Uuid;

use crate::error::{MediaError, MediaResult};

/// Unique path for an intermediate artifact of one scene.
///
/// `scene_{n}_{uuid}_{role}.{ext}`: concurrent scene tasks sharing a
/// directory never collide.
pub fn scene_artifact_path(dir: &Path, scene_number: u32, role: &str, ext: &str) -> PathBuf {
    dir.join(format!(
        "scene_{}_{}_{}.{}",
        scene_number,
        Uuid::new_v4().simple(),
        role,
        ext
    ))
}

/// Fail with [`MediaError::MediaFileMissing`] unless `path` is a readable file.
pub async fn ensure_readable_file(path: &Path) -> MediaResult<()> {
    let missing = || MediaError::MediaFileMissing(path.to_path_buf());

    let metadata = fs::metadata(path).await.map_err(|_| missing())?;
    if !metadata.is_file() {
        return Err(missing());
    }

    // Opening proves read access, not just existence
    fs::File::open(path).await.map_err(|_| missing())?;
    Ok(())
}

/// Move a file from `src` to `dst`, handling cross-device moves.
///
/// Tries a rename first; on EXDEV falls back to copying into a temp file next
/// to `dst`, renaming it into place and deleting `src`.
pub async fn move_file(src: impl AsRef<Path>, dst: impl AsRef<Path>) -> MediaResult<()> {
    let src = src.as_ref();
    let dst = dst.as_ref();

    if let Some(parent) = dst.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent).await?;
        }
    }

    match fs::rename(src, dst).await {
        Ok(()) => Ok(()),
        Err(e) if is_cross_device_error(&e) => {
            tracing::debug!(
                "Cross-device rename detected, falling back to copy+delete: {} -> {}",
                src.display(),
                dst.display()
            );
            copy_and_delete(src, dst).await
        }
        Err(e) => Err(MediaError::from(e)),
    }
}

/// Remove a directory tree, logging instead of failing.
pub async fn remove_dir_best_effort(dir: &Path) {
    match fs::remove_dir_all(dir).await {
        Ok(()) => tracing::debug!("Removed {}", dir.display()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => tracing::warn!("Failed to remove {}: {}", dir.display(), e),
    }
}

/// EXDEV is error code 18 on Linux/macOS.
fn is_cross_device_error(e: &std::io::Error) -> bool {
    e.raw_os_error() == Some(18)
}

async fn copy_and_delete(src: &Path, dst: &Path) -> MediaResult<()> {
    let tmp_dst = dst.with_extension("tmp");

    fs::copy(src, &tmp_dst).await.map_err(|e| {
        tracing::error!(
            "Failed to copy file during cross-device move: {} -> {}: {}",
            src.display(),
            tmp_dst.display(),
            e
        );
        MediaError::from(e)
    })?;

    if let Err(e) = fs::rename(&tmp_dst, dst).await {
        let _ = fs::remove_file(&tmp_dst).await;
        tracing::error!(
            "Failed to rename temp file during cross-device move: {} -> {}: {}",
            tmp_dst.display(),
            dst.display(),
            e
        );
        return Err(MediaError::from(e));
    }

    if let Err(e) = fs::remove_file(src).await {
        tracing::warn!(
            "Failed to remove source file after cross-device move: {}: {}",
            src.display(),
            e
        );
    }

    Ok(())
}
