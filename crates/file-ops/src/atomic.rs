use std::fs::{self, OpenOptions, Permissions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use tracing::{debug, warn};

use crate::FileOpsError;

static TEMP_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Returns a unique temporary path in the same directory as `target`.
pub fn temp_path_for(target: &Path) -> Result<PathBuf, FileOpsError> {
    let parent = target
        .parent()
        .ok_or_else(|| FileOpsError::InvalidPath(target.to_path_buf()))?;
    let name = target
        .file_name()
        .ok_or_else(|| FileOpsError::InvalidPath(target.to_path_buf()))?
        .to_string_lossy();
    let seq = TEMP_COUNTER.fetch_add(1, Ordering::Relaxed);
    Ok(parent.join(format!(".{name}.{}-{seq}.tmp", std::process::id())))
}

/// Writes `data` to `target` through a temp file and a rename.
pub fn write_atomic(target: &Path, data: &[u8]) -> Result<(), FileOpsError> {
    write_atomic_with(target, data, None)
}

/// Like [`write_atomic`], applying `permissions` to the new file before
/// it replaces `target`.
///
/// The temp file is flushed to disk before the rename and the directory
/// is synced after it. On failure the temp file is removed and `target`
/// keeps its previous content.
pub fn write_atomic_with(
    target: &Path,
    data: &[u8],
    permissions: Option<Permissions>,
) -> Result<(), FileOpsError> {
    let temp = temp_path_for(target)?;

    let result = write_temp(&temp, data, permissions).and_then(|()| {
        fs::rename(&temp, target).map_err(FileOpsError::io(target))
    });
    if let Err(e) = result {
        if let Err(cleanup) = fs::remove_file(&temp)
            && cleanup.kind() != std::io::ErrorKind::NotFound
        {
            warn!(temp = %temp.display(), error = %cleanup, "failed to remove temp file");
        }
        return Err(e);
    }

    if let Some(parent) = target.parent() {
        sync_dir(parent)?;
    }
    debug!(path = %target.display(), bytes = data.len(), "atomic write complete");
    Ok(())
}

fn write_temp(
    temp: &Path,
    data: &[u8],
    permissions: Option<Permissions>,
) -> Result<(), FileOpsError> {
    let mut file = OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(temp)
        .map_err(FileOpsError::io(temp))?;
    file.write_all(data).map_err(FileOpsError::io(temp))?;
    file.sync_all().map_err(FileOpsError::io(temp))?;
    drop(file);

    if let Some(permissions) = permissions {
        fs::set_permissions(temp, permissions).map_err(FileOpsError::io(temp))?;
    }
    Ok(())
}

/// Flushes directory metadata so a completed rename survives a crash.
#[cfg(unix)]
pub fn sync_dir(dir: &Path) -> Result<(), FileOpsError> {
    fs::File::open(dir)
        .and_then(|d| d.sync_all())
        .map_err(FileOpsError::io(dir))
}

/// Directory handles cannot be synced on this platform; renames are
/// journaled by the filesystem.
#[cfg(not(unix))]
pub fn sync_dir(_dir: &Path) -> Result<(), FileOpsError> {
    Ok(())
}

/// Returns the key used to decide whether two paths name the same file.
///
/// Canonical when the file exists; otherwise the path made absolute.
/// Case-folded on Windows.
pub fn normalized_path(path: &Path) -> PathBuf {
    let resolved = fs::canonicalize(path).unwrap_or_else(|_| {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            std::env::current_dir()
                .map(|cwd| cwd.join(path))
                .unwrap_or_else(|_| path.to_path_buf())
        }
    });
    if cfg!(windows) {
        PathBuf::from(resolved.to_string_lossy().to_lowercase())
    } else {
        resolved
    }
}
