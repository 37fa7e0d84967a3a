//! Progress and result events for the presentation layer.

use std::path::PathBuf;

use tokio::sync::mpsc;

use crate::plan::ModuleCandidate;
use crate::result::TransactionResult;
use crate::root::InstallationRoot;

/// Event emitted while scanning or executing.
#[derive(Debug, Clone)]
pub enum EngineEvent {
    /// A scan pass started.
    ScanStarted,
    /// An installation root was discovered and passed the exclusion filter check.
    RootDiscovered {
        root: InstallationRoot,
        eligible: bool,
    },
    /// A module file matched a family pattern.
    ModuleFound { candidate: ModuleCandidate },
    /// Planning finished.
    PlanReady { total: usize, updates: usize },
    /// A transaction is about to start on a target.
    TransactionStarted { index: usize, path: PathBuf },
    /// A plan entry reached its terminal state.
    TransactionFinished(TransactionResult),
    /// All entries have results.
    RunFinished {
        succeeded: usize,
        failed: usize,
        rolled_back: usize,
        skipped: usize,
    },
}

/// Observer for engine events. Implementations must not block.
pub trait EventSink: Send + Sync {
    fn emit(&self, event: EngineEvent);
}

/// Sink that drops every event.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSink;

impl EventSink for NullSink {
    fn emit(&self, _event: EngineEvent) {}
}

impl EventSink for mpsc::UnboundedSender<EngineEvent> {
    fn emit(&self, event: EngineEvent) {
        // A dropped receiver only means nobody is listening.
        let _ = self.send(event);
    }
}
