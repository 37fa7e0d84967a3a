//! Version extraction for PE (Portable Executable) modules.
//!
//! Walks the container structure far enough to reach the `RT_VERSION`
//! resource and its `VS_FIXEDFILEINFO` block. The module is never loaded
//! or executed. Any structural problem collapses to "unknown" (`None`) at
//! the public boundary.

mod pe;

#[cfg(any(test, feature = "fixtures"))]
pub mod fixture;

use std::path::Path;

use dllup_model::VersionTag;

pub use pe::parse_fixed_version;

/// Errors produced while walking a PE image.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PeError {
    #[error("not a PE image: {0}")]
    NotPe(String),

    #[error("truncated at offset {offset} (need {needed} bytes)")]
    Truncated { offset: usize, needed: usize },

    #[error("no version resource")]
    NoVersionResource,

    #[error("malformed resource data: {0}")]
    Malformed(String),
}

/// Reads the file version of the module at `path`.
///
/// Returns `None` when the file is unreadable or locked, is not a PE
/// image, or carries no parseable version resource.
pub fn read_version(path: &Path) -> Option<VersionTag> {
    let data = match std::fs::read(path) {
        Ok(data) => data,
        Err(e) => {
            tracing::debug!(path = %path.display(), error = %e, "module unreadable");
            return None;
        }
    };

    match parse_fixed_version(&data) {
        Ok(version) => Some(version),
        Err(e) => {
            tracing::debug!(path = %path.display(), error = %e, "no usable version metadata");
            None
        }
    }
}

/// Reads the file version from an in-memory module image.
pub fn read_version_bytes(data: &[u8]) -> Option<VersionTag> {
    parse_fixed_version(data).ok()
}
