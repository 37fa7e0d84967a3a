use std::fs;
use std::path::{Path, PathBuf};

use dllup_model::{InstallationRoot, LauncherKind};
use tracing::debug;

/// Returns the immediate subdirectories of `dir`, sorted. Unreadable
/// directories yield nothing.
pub(crate) fn subdirectories(dir: &Path) -> Vec<PathBuf> {
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) => {
            debug!(dir = %dir.display(), error = %e, "cannot list directory");
            return Vec::new();
        }
    };

    let mut dirs: Vec<PathBuf> = entries
        .flatten()
        .filter(|entry| entry.path().is_dir())
        .map(|entry| entry.path())
        .collect();
    dirs.sort();
    dirs
}

/// One root of `kind` per subdirectory of `dir`.
pub(crate) fn child_roots(kind: LauncherKind, dir: &Path) -> Vec<InstallationRoot> {
    subdirectories(dir)
        .into_iter()
        .map(|path| InstallationRoot::new(kind, path))
        .collect()
}

/// Reads a file as text, mapping failures into a discovery error.
pub(crate) fn read_text(path: &Path) -> Result<String, crate::DiscoveryError> {
    fs::read_to_string(path)
        .map_err(|e| crate::DiscoveryError::Io(format!("failed to read {}: {e}", path.display())))
}
