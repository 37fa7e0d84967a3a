//! Shared data model for the dllup workspace.
//!
//! Every crate in the pipeline (discovery, exclusion, planning, execution,
//! backup) speaks in these types. Nothing here touches the filesystem except
//! [`PayloadRef::load`].

pub mod events;
pub mod family;
pub mod plan;
pub mod result;
pub mod root;
pub mod version;

// Re-export primary types.
pub use events::{EngineEvent, EventSink, NullSink};
pub use family::ModuleFamily;
pub use plan::{ModuleCandidate, PayloadRef, UpdateAction, UpdatePlanEntry};
pub use result::{TransactionOutcome, TransactionResult};
pub use root::{InstallationRoot, LauncherKind};
pub use version::{ParseVersionError, VersionTag};
