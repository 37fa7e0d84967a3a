use std::fs;
use std::path::Path;

use crate::FileOpsError;
use crate::atomic::write_atomic_with;

/// Writes new content over an existing module file.
///
/// Implementations must leave `target` either untouched or fully
/// replaced.
pub trait FileReplacer: Send + Sync {
    fn replace(&self, target: &Path, contents: &[u8]) -> Result<(), FileOpsError>;
}

/// Temp-write-then-rename replacement that keeps the target's permissions.
#[derive(Debug, Default, Clone, Copy)]
pub struct AtomicReplacer;

impl FileReplacer for AtomicReplacer {
    fn replace(&self, target: &Path, contents: &[u8]) -> Result<(), FileOpsError> {
        let permissions = fs::metadata(target)
            .map(|meta| meta.permissions())
            .map_err(FileOpsError::io(target))?;
        write_atomic_with(target, contents, Some(permissions))
    }
}
