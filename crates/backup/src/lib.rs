//! Backups of original module files.
//!
//! Every blob is stored next to a JSON sidecar describing it, under a
//! stable `<game>/<family>/` layout, so a later run can list and restore
//! an earlier run's backups without any other database.

mod record;
mod store;

use std::path::PathBuf;

pub use record::{BackupRecord, slugify};
pub use store::{BackupFilter, BackupStore, PruneOptions};

/// Errors for backup operations.
#[derive(Debug, thiserror::Error)]
pub enum BackupError {
    #[error("backup storage unavailable at {}: {message}", path.display())]
    StorageUnavailable { path: PathBuf, message: String },

    #[error("I/O error: {0}")]
    Io(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("verification failed: {0}")]
    Verification(String),

    #[error("file operation failed: {0}")]
    FileOps(#[from] dllup_file_ops::FileOpsError),

    #[error("backup not found: {0}")]
    NotFound(String),
}
