//! Decides which installation roots may be updated.
//!
//! The externally supplied [`ExclusionTable`] names games that must not be
//! touched; [`UserOverrides`] let the user force a game in or out. An
//! [`ExclusionFilter`] combines both and answers per root.

mod filter;
mod overrides;
mod pattern;
mod table;

pub use filter::{Eligibility, ExclusionFilter};
pub use overrides::UserOverrides;
pub use pattern::Pattern;
pub use table::{ExclusionEntry, ExclusionTable};

/// Errors for exclusion table handling.
#[derive(Debug, thiserror::Error)]
pub enum ExclusionError {
    #[error("invalid pattern '{pattern}': {message}")]
    InvalidPattern { pattern: String, message: String },

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(String),
}
