use std::path::Path;

use crate::FileOpsError;

/// Returns the bytes available to the current user on the filesystem
/// holding `path`. A path that does not exist yet is measured at its
/// nearest existing ancestor.
pub fn available_space(path: &Path) -> Result<u64, FileOpsError> {
    let existing = path
        .ancestors()
        .find(|p| p.exists())
        .ok_or_else(|| FileOpsError::InvalidPath(path.to_path_buf()))?;
    fs4::available_space(existing).map_err(FileOpsError::io(existing))
}
