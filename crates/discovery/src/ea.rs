//! EA app.

use std::fs;
use std::path::{Path, PathBuf};

use dllup_model::{InstallationRoot, LauncherKind};
use tracing::debug;

use crate::env::DiscoveryEnv;
use crate::fs_util::child_roots;

const INSTALL_DIR_KEY: &str = "user.downloadinplacedir=";

/// Extracts the download-in-place directory from a `user_*.ini` file.
fn parse_user_ini(text: &str) -> Option<PathBuf> {
    text.lines()
        .map(str::trim)
        .find_map(|line| line.strip_prefix(INSTALL_DIR_KEY))
        .map(|dir| dir.trim().trim_end_matches(['/', '\\']))
        .filter(|dir| !dir.is_empty())
        .map(PathBuf::from)
}

fn user_ini_dirs(local_app_data: &Path) -> Vec<PathBuf> {
    let settings = local_app_data.join("Electronic Arts").join("EA Desktop");
    let Ok(entries) = fs::read_dir(&settings) else {
        return Vec::new();
    };

    let mut inis: Vec<PathBuf> = entries
        .flatten()
        .map(|entry| entry.path())
        .filter(|path| {
            path.file_name()
                .map(|n| n.to_string_lossy().to_lowercase())
                .is_some_and(|n| n.starts_with("user_") && n.ends_with(".ini"))
        })
        .collect();
    inis.sort();

    inis.iter()
        .filter_map(|ini| {
            let dir = fs::read_to_string(ini).ok().and_then(|text| parse_user_ini(&text));
            if dir.is_none() {
                debug!(ini = %ini.display(), "no install dir in EA settings");
            }
            dir
        })
        .collect()
}

pub(crate) fn discover(env: &DiscoveryEnv) -> Vec<InstallationRoot> {
    let mut dirs = env
        .local_app_data
        .as_deref()
        .map(user_ini_dirs)
        .unwrap_or_default();
    for program_files in &env.program_files {
        dirs.push(program_files.join("EA Games"));
    }
    dirs.dedup();

    dirs.iter()
        .flat_map(|dir| child_roots(LauncherKind::Ea, dir))
        .collect()
}
