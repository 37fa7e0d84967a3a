use std::fmt;
use std::path::PathBuf;

use serde::Serialize;

use crate::plan::UpdatePlanEntry;

/// Terminal state of one plan entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionOutcome {
    Success,
    Failed,
    RolledBack,
    /// Entry was not an update, or was never dispatched.
    Skipped,
}

impl fmt::Display for TransactionOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransactionOutcome::Success => write!(f, "success"),
            TransactionOutcome::Failed => write!(f, "failed"),
            TransactionOutcome::RolledBack => write!(f, "rolled back"),
            TransactionOutcome::Skipped => write!(f, "skipped"),
        }
    }
}

/// Result emitted exactly once per plan entry.
#[derive(Debug, Clone, Serialize)]
pub struct TransactionResult {
    pub entry: UpdatePlanEntry,
    pub outcome: TransactionOutcome,
    pub detail: Option<String>,
    /// True when the target content differs from what it was before the run.
    pub modified: bool,
    /// Backup record id, when a backup was written.
    pub backup_id: Option<String>,
    /// Backup blob location, for manual recovery.
    pub backup_blob: Option<PathBuf>,
}

impl TransactionResult {
    /// Result for an entry that never touches the filesystem.
    pub fn skipped(entry: UpdatePlanEntry, detail: impl Into<String>) -> Self {
        Self {
            entry,
            outcome: TransactionOutcome::Skipped,
            detail: Some(detail.into()),
            modified: false,
            backup_id: None,
            backup_blob: None,
        }
    }

    /// Failure that happened before anything was written to the target.
    pub fn failed_untouched(entry: UpdatePlanEntry, detail: impl Into<String>) -> Self {
        Self {
            entry,
            outcome: TransactionOutcome::Failed,
            detail: Some(detail.into()),
            modified: false,
            backup_id: None,
            backup_blob: None,
        }
    }
}
