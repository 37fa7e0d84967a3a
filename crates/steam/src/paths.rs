use std::path::{Path, PathBuf};

use crate::SteamError;

/// Provides access to the paths of one Steam installation or library folder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Paths {
    base_dir: PathBuf,
}

impl Paths {
    /// Creates a new `Paths` instance with auto-detected Steam directory.
    pub fn new() -> Result<Self, SteamError> {
        let base_dir = detect_base_dirs()
            .into_iter()
            .next()
            .ok_or(SteamError::NotFound)?;
        Ok(Self { base_dir })
    }

    /// Creates a new `Paths` instance with a custom base directory.
    pub fn with_base(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
        }
    }

    /// Returns the Steam base directory.
    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    /// Returns the steamapps directory.
    pub fn steamapps_dir(&self) -> PathBuf {
        self.base_dir.join("steamapps")
    }

    /// Returns the path to libraryfolders.vdf.
    pub fn library_folders_path(&self) -> PathBuf {
        self.steamapps_dir().join("libraryfolders.vdf")
    }

    /// Returns the directory holding installed game folders.
    pub fn common_dir(&self) -> PathBuf {
        self.steamapps_dir().join("common")
    }

    /// Returns the Proton compatibility data directory.
    pub fn compatdata_dir(&self) -> PathBuf {
        self.steamapps_dir().join("compatdata")
    }

    /// Returns the `drive_c` of the Proton prefix for `app_id`.
    pub fn prefix_drive_c(&self, app_id: &str) -> PathBuf {
        self.compatdata_dir()
            .join(app_id)
            .join("pfx")
            .join("drive_c")
    }

    /// Returns the path of the app manifest for `app_id`.
    pub fn app_manifest_path(&self, app_id: &str) -> PathBuf {
        self.steamapps_dir()
            .join(format!("appmanifest_{app_id}.acf"))
    }
}

/// Returns every Steam base directory found on this machine.
pub fn detect_base_dirs() -> Vec<PathBuf> {
    get_base_dirs()
}

// Platform-specific base directory detection.
#[cfg(target_os = "linux")]
fn get_base_dirs() -> Vec<PathBuf> {
    match std::env::var_os("HOME") {
        Some(home) => crate::paths_linux::get_base_dirs(Path::new(&home)),
        None => Vec::new(),
    }
}

#[cfg(target_os = "windows")]
fn get_base_dirs() -> Vec<PathBuf> {
    crate::paths_windows::get_base_dirs()
}

#[cfg(not(any(target_os = "linux", target_os = "windows")))]
fn get_base_dirs() -> Vec<PathBuf> {
    Vec::new()
}
