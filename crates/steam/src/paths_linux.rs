use std::fs;
use std::path::{Path, PathBuf};

/// Returns every existing Steam base directory under `home`.
///
/// `~/.steam/steam` is usually a symlink to one of the others, so the
/// result is deduplicated by canonical path.
pub fn get_base_dirs(home: &Path) -> Vec<PathBuf> {
    let candidates = [
        home.join(".steam").join("steam"),
        home.join(".steam").join("debian-installation"),
        home.join(".local").join("share").join("Steam"),
        // Flatpak
        home.join(".var")
            .join("app")
            .join("com.valvesoftware.Steam")
            .join(".steam")
            .join("steam"),
        home.join(".var")
            .join("app")
            .join("com.valvesoftware.Steam")
            .join("data")
            .join("Steam"),
    ];

    let mut seen = Vec::new();
    let mut dirs = Vec::new();
    for dir in candidates {
        if !dir.is_dir() {
            continue;
        }
        let canonical = fs::canonicalize(&dir).unwrap_or_else(|_| dir.clone());
        if seen.contains(&canonical) {
            continue;
        }
        seen.push(canonical);
        dirs.push(dir);
    }
    dirs
}
