pub mod library;
pub mod paths;
#[cfg(target_os = "linux")]
pub mod paths_linux;
#[cfg(target_os = "windows")]
pub mod paths_windows;
pub mod vdf;

// Re-export primary types.
pub use library::{
    AppManifest, ProtonPrefix, SteamGame, installed_games, library_folders, load_app_manifests,
    parse_app_manifest, proton_prefixes,
};
pub use paths::{Paths, detect_base_dirs};
pub use vdf::{VdfValue, load_text_vdf, parse_text_vdf};

/// Errors for Steam operations.
#[derive(Debug, thiserror::Error)]
pub enum SteamError {
    #[error("steam installation not found")]
    NotFound,

    #[error("app manifest missing field: {0}")]
    Manifest(String),

    #[error("VDF parse error: {0}")]
    Vdf(String),

    #[error("I/O error: {0}")]
    Io(String),
}
