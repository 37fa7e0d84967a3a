//! Installation root discovery and module search.
//!
//! Each [`Launcher`] strategy turns the filesystem anchors held by a
//! [`DiscoveryEnv`] into [`InstallationRoot`](dllup_model::InstallationRoot)s.
//! [`find_modules`] then walks a root for the filenames in [`ModulePatterns`].

mod battlenet;
mod discoverer;
mod ea;
mod env;
mod epic;
mod fs_util;
mod gog;
mod launcher;
mod patterns;
mod prefix;
#[cfg(windows)]
mod registry;
mod steam;
mod ubisoft;
mod walker;
mod xbox;

pub use discoverer::{PathDiscoverer, Roots};
pub use env::DiscoveryEnv;
pub use launcher::Launcher;
pub use patterns::ModulePatterns;
pub use walker::{DEFAULT_MAX_DEPTH, find_modules};

/// Errors for discovery operations.
///
/// Strategies log and swallow these; a broken manifest contributes no roots.
#[derive(Debug, thiserror::Error)]
pub enum DiscoveryError {
    #[error("I/O error: {0}")]
    Io(String),

    #[error("manifest error: {0}")]
    Manifest(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}
