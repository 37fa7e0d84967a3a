//! Scan, plan and update pipeline.
//!
//! # Pipeline
//!
//! 1. [`scan`] walks every eligible installation root found by the
//!    discoverer, reads module versions and builds a flat plan with the
//!    [`UpdatePlanner`].
//! 2. [`TransactionExecutor::execute`] runs the plan. Each update entry is
//!    one backup-then-replace transaction; a failed replace is undone from
//!    the backup. Every entry yields exactly one result.

pub mod catalog;
pub mod error;
pub mod executor;
pub mod planner;
pub mod scan;

pub use catalog::{CatalogEntry, ReplacementCatalog};
pub use error::ExecutorError;
pub use executor::{ExecutorConfig, TransactionExecutor};
pub use planner::{Preferences, ScannedModule, UpdatePlanner};
pub use scan::{ScanContext, scan};
