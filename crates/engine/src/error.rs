//! Engine error types.

use dllup_backup::BackupError;

/// Errors that stop a run before any target is written.
///
/// Failures of individual transactions are reported as results, never
/// through this type.
#[derive(Debug, thiserror::Error)]
pub enum ExecutorError {
    #[error("precondition failed: {0}")]
    Precondition(String),

    #[error("backup store error: {0}")]
    Backup(#[from] BackupError),
}
