//! Ubisoft Connect.

use std::path::PathBuf;

use dllup_model::{InstallationRoot, LauncherKind};

use crate::env::DiscoveryEnv;
use crate::fs_util::child_roots;

/// Launcher install dirs: from the registry, else the default location.
fn launcher_dirs(env: &DiscoveryEnv) -> Vec<PathBuf> {
    let mut dirs = Vec::new();

    #[cfg(windows)]
    if env.registry
        && let Some(key) = crate::registry::open_software_key(r"Ubisoft\Launcher")
        && let Some(dir) = crate::registry::string_value(&key, "InstallDir")
    {
        dirs.push(PathBuf::from(dir));
    }

    for program_files in &env.program_files {
        let dir = program_files.join("Ubisoft").join("Ubisoft Game Launcher");
        if !dirs.contains(&dir) {
            dirs.push(dir);
        }
    }
    dirs
}

#[cfg(windows)]
fn registry_installs() -> Vec<InstallationRoot> {
    use crate::registry::{child_keys, open_software_key, string_value};

    let Some(installs) = open_software_key(r"Ubisoft\Launcher\Installs") else {
        return Vec::new();
    };
    child_keys(&installs)
        .into_iter()
        .filter_map(|(id, key)| {
            let dir = string_value(&key, "InstallDir")?;
            let path = PathBuf::from(dir.trim_end_matches(['/', '\\']));
            Some(InstallationRoot::new(LauncherKind::Ubisoft, path).with_app_id(id))
        })
        .collect()
}

#[cfg(not(windows))]
fn registry_installs() -> Vec<InstallationRoot> {
    Vec::new()
}

pub(crate) fn discover(env: &DiscoveryEnv) -> Vec<InstallationRoot> {
    let mut roots = if env.registry {
        registry_installs()
    } else {
        Vec::new()
    };

    for dir in launcher_dirs(env) {
        roots.extend(child_roots(LauncherKind::Ubisoft, &dir.join("games")));
    }

    roots.retain(|root| root.path.is_dir());
    roots
}
