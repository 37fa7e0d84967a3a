//! File operations used when replacing module files.
//!
//! Every write goes to a temporary file next to its destination and is
//! renamed over it, so readers only ever see the old or the new content.

mod atomic;
mod checksum;
mod replace;
mod space;

use std::path::PathBuf;

pub use atomic::{normalized_path, sync_dir, temp_path_for, write_atomic, write_atomic_with};
pub use checksum::{calculate_file_checksum, checksum_bytes};
pub use replace::{AtomicReplacer, FileReplacer};
pub use space::available_space;

/// Errors for file operations.
#[derive(Debug, thiserror::Error)]
pub enum FileOpsError {
    #[error("I/O error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid target path: {}", .0.display())]
    InvalidPath(PathBuf),
}

impl FileOpsError {
    pub(crate) fn io(path: impl Into<PathBuf>) -> impl FnOnce(std::io::Error) -> Self {
        let path = path.into();
        move |source| FileOpsError::Io { path, source }
    }
}
