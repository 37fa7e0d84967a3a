//! Proton and Wine compatibility prefixes.
//!
//! A prefix holds a whole Windows drive. The search is redirected into
//! the directories games install to, and every game folder there is a root.

use std::path::{Path, PathBuf};

use dllup_model::{InstallationRoot, LauncherKind};
use tracing::debug;

use crate::env::DiscoveryEnv;
use crate::fs_util::subdirectories;

/// Directories under `drive_c` that hold game folders.
const SEARCH_DIRS: &[&str] = &["Program Files", "Program Files (x86)", "Games", "GOG Games"];

/// Folders Wine creates in `Program Files` by itself.
const BUILTIN_DIRS: &[&str] = &[
    "common files",
    "internet explorer",
    "microsoft.net",
    "windows defender",
    "windows mail",
    "windows media player",
    "windows nt",
    "windows photo viewer",
    "windows sidebar",
    "windowspowershell",
];

fn is_builtin(dir: &Path) -> bool {
    dir.file_name()
        .map(|name| name.to_string_lossy().to_lowercase())
        .is_some_and(|name| BUILTIN_DIRS.contains(&name.as_str()))
}

/// Returns one root per game folder inside a prefix's `drive_c`.
pub(crate) fn prefix_roots(
    kind: LauncherKind,
    drive_c: &Path,
    app_id: Option<&str>,
) -> Vec<InstallationRoot> {
    SEARCH_DIRS
        .iter()
        .map(|dir| drive_c.join(dir))
        .flat_map(|dir| subdirectories(&dir))
        .filter(|dir| !is_builtin(dir))
        .map(|dir| {
            let root = InstallationRoot::new(kind, dir);
            match app_id {
                Some(id) => root.with_app_id(id),
                None => root,
            }
        })
        .collect()
}

/// Returns the `drive_c` of every Wine and Lutris prefix under the home dir.
pub(crate) fn wine_drives(home: &Path) -> Vec<PathBuf> {
    let mut drives: Vec<PathBuf> = [
        home.join(".wine"),
        home.join(".local").join("share").join("wine"),
    ]
    .into_iter()
    .map(|prefix| prefix.join("drive_c"))
    .filter(|drive_c| drive_c.is_dir())
    .collect();

    // Lutris keeps one prefix per game folder.
    for game_dir in subdirectories(&home.join("Games")) {
        for drive_c in [game_dir.join("drive_c"), game_dir.join("prefix").join("drive_c")] {
            if drive_c.is_dir() {
                debug!(prefix = %drive_c.display(), "found lutris prefix");
                drives.push(drive_c);
            }
        }
    }

    drives
}

pub(crate) fn discover_wine(env: &DiscoveryEnv) -> Vec<InstallationRoot> {
    let Some(home) = env.home.as_deref() else {
        return Vec::new();
    };

    wine_drives(home)
        .iter()
        .flat_map(|drive_c| prefix_roots(LauncherKind::WinePrefix, drive_c, None))
        .collect()
}
