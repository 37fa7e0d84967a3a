//! Steam library folders, app manifests and Proton prefixes.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::SteamError;
use crate::paths::Paths;
use crate::vdf::{VdfValue, load_text_vdf, parse_text_vdf};

/// Fields of an `appmanifest_<appid>.acf` file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppManifest {
    pub app_id: String,
    pub name: String,
    pub install_dir: String,
}

/// An installed game folder under `steamapps/common`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SteamGame {
    pub app_id: Option<String>,
    pub name: String,
    pub path: PathBuf,
}

/// The Windows drive of a Proton compatibility prefix.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProtonPrefix {
    pub app_id: String,
    pub drive_c: PathBuf,
}

/// Returns every library folder of the installation at `paths`.
///
/// The base directory itself is always the first library. Libraries
/// whose folder no longer exists (unplugged removable media) are skipped.
pub fn library_folders(paths: &Paths) -> Vec<PathBuf> {
    let mut libraries = vec![paths.base_dir().to_path_buf()];

    let vdf_path = paths.library_folders_path();
    if !vdf_path.exists() {
        return libraries;
    }

    match load_text_vdf(&vdf_path) {
        Ok((_, root)) => {
            for dir in parse_library_paths(&root) {
                if !dir.is_dir() {
                    debug!(library = %dir.display(), "skipping unavailable steam library");
                    continue;
                }
                if !libraries.iter().any(|known| same_dir(known, &dir)) {
                    libraries.push(dir);
                }
            }
        }
        Err(e) => warn!(path = %vdf_path.display(), error = %e, "failed to parse libraryfolders.vdf"),
    }

    libraries
}

/// Extracts library paths from both libraryfolders.vdf layouts.
///
/// Current format: `"0" { "path" "..." }`. Legacy format: `"1" "..."`.
/// Non-numeric keys such as `TimeNextStatsReport` are ignored.
fn parse_library_paths(root: &VdfValue) -> Vec<PathBuf> {
    root.entries()
        .iter()
        .filter(|(key, _)| !key.is_empty() && key.bytes().all(|b| b.is_ascii_digit()))
        .filter_map(|(_, value)| match value {
            VdfValue::Str(path) => Some(path.as_str()),
            VdfValue::Object(_) => value.get_str("path"),
        })
        .filter(|path| !path.is_empty())
        .map(PathBuf::from)
        .collect()
}

fn same_dir(a: &Path, b: &Path) -> bool {
    match (fs::canonicalize(a), fs::canonicalize(b)) {
        (Ok(a), Ok(b)) => a == b,
        _ => a == b,
    }
}

/// Parses the text of an app manifest.
pub fn parse_app_manifest(text: &str) -> Result<AppManifest, SteamError> {
    let (_, root) = parse_text_vdf(text)?;
    let field = |key: &str| {
        root.get_str(key)
            .map(str::to_string)
            .ok_or_else(|| SteamError::Manifest(key.to_string()))
    };

    let app_id = field("appid")?;
    let install_dir = field("installdir")?;
    let name = root
        .get_str("name")
        .filter(|name| !name.trim().is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| install_dir.clone());

    Ok(AppManifest {
        app_id,
        name,
        install_dir,
    })
}

/// Loads every readable `appmanifest_*.acf` in a library.
pub fn load_app_manifests(library: &Paths) -> Vec<AppManifest> {
    let Ok(entries) = fs::read_dir(library.steamapps_dir()) else {
        return Vec::new();
    };

    let mut manifests = Vec::new();
    for entry in entries.flatten() {
        let file_name = entry.file_name();
        let file_name = file_name.to_string_lossy();
        if !(file_name.starts_with("appmanifest_") && file_name.ends_with(".acf")) {
            continue;
        }

        let path = entry.path();
        let parsed = fs::read_to_string(&path)
            .map_err(|e| SteamError::Io(e.to_string()))
            .and_then(|text| parse_app_manifest(&text));
        match parsed {
            Ok(manifest) => manifests.push(manifest),
            Err(e) => warn!(path = %path.display(), error = %e, "skipping unreadable app manifest"),
        }
    }
    manifests
}

/// Returns the game folders under a library's `steamapps/common`.
///
/// Names and app ids come from the manifest whose `installdir` matches
/// the folder; folders without a manifest are named after the folder.
pub fn installed_games(library: &Paths) -> Vec<SteamGame> {
    let Ok(entries) = fs::read_dir(library.common_dir()) else {
        return Vec::new();
    };
    let manifests = load_app_manifests(library);

    let mut games: Vec<SteamGame> = entries
        .flatten()
        // Symlinked game folders count.
        .filter(|entry| entry.path().is_dir())
        .map(|entry| {
            let dir_name = entry.file_name().to_string_lossy().into_owned();
            let manifest = manifests
                .iter()
                .find(|m| m.install_dir.eq_ignore_ascii_case(&dir_name));
            SteamGame {
                app_id: manifest.map(|m| m.app_id.clone()),
                name: manifest.map(|m| m.name.clone()).unwrap_or(dir_name),
                path: entry.path(),
            }
        })
        .collect();

    games.sort_by(|a, b| a.path.cmp(&b.path));
    games
}

/// Returns the Proton prefixes of a library that have a `drive_c`.
pub fn proton_prefixes(library: &Paths) -> Vec<ProtonPrefix> {
    let Ok(entries) = fs::read_dir(library.compatdata_dir()) else {
        return Vec::new();
    };

    let mut prefixes: Vec<ProtonPrefix> = entries
        .flatten()
        .filter_map(|entry| {
            let app_id = entry.file_name().to_string_lossy().into_owned();
            let drive_c = library.prefix_drive_c(&app_id);
            drive_c.is_dir().then_some(ProtonPrefix { app_id, drive_c })
        })
        .collect();

    prefixes.sort_by(|a, b| a.drive_c.cmp(&b.drive_c));
    prefixes
}
