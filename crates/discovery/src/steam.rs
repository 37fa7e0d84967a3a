use std::fs;
use std::path::PathBuf;

use dllup_model::{InstallationRoot, LauncherKind};
use dllup_steam::Paths;
use tracing::debug;

use crate::env::DiscoveryEnv;
use crate::prefix::prefix_roots;

/// All library folders across every known Steam installation.
fn libraries(env: &DiscoveryEnv) -> Vec<Paths> {
    let mut seen: Vec<PathBuf> = Vec::new();
    let mut libraries = Vec::new();

    for base in &env.steam_dirs {
        for library in dllup_steam::library_folders(&Paths::with_base(base)) {
            let key = fs::canonicalize(&library).unwrap_or_else(|_| library.clone());
            if seen.contains(&key) {
                continue;
            }
            seen.push(key);
            debug!(library = %library.display(), "steam library");
            libraries.push(Paths::with_base(library));
        }
    }
    libraries
}

pub(crate) fn discover_steam(env: &DiscoveryEnv) -> Vec<InstallationRoot> {
    libraries(env)
        .iter()
        .flat_map(dllup_steam::installed_games)
        .map(|game| {
            let root = InstallationRoot::new(LauncherKind::Steam, game.path).with_name(game.name);
            match game.app_id {
                Some(app_id) => root.with_app_id(app_id),
                None => root,
            }
        })
        .collect()
}

pub(crate) fn discover_proton(env: &DiscoveryEnv) -> Vec<InstallationRoot> {
    libraries(env)
        .iter()
        .flat_map(dllup_steam::proton_prefixes)
        .flat_map(|prefix| {
            prefix_roots(
                LauncherKind::ProtonPrefix,
                &prefix.drive_c,
                Some(&prefix.app_id),
            )
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use std::path::Path;

    use super::*;

    fn steam_env(base: &Path) -> DiscoveryEnv {
        DiscoveryEnv {
            steam_dirs: vec![base.to_path_buf()],
            ..Default::default()
        }
    }

    #[test]
    fn steam_games_from_all_libraries() {
        let base = tempfile::tempdir().unwrap();
        let extra = tempfile::tempdir().unwrap();
        let paths = Paths::with_base(base.path());
        let extra_paths = Paths::with_base(extra.path());

        fs::create_dir_all(paths.common_dir().join("Cyberpunk 2077")).unwrap();
        fs::create_dir_all(extra_paths.common_dir().join("Alan Wake 2")).unwrap();
        fs::write(
            paths.app_manifest_path("1091500"),
            "\"AppState\" { \"appid\" \"1091500\" \"name\" \"Cyberpunk 2077\" \"installdir\" \"Cyberpunk 2077\" }",
        )
        .unwrap();
        fs::write(
            paths.library_folders_path(),
            format!(
                "\"libraryfolders\" {{ \"0\" {{ \"path\" \"{}\" }} \"1\" {{ \"path\" \"{}\" }} }}",
                base.path().display(),
                extra.path().display()
            ),
        )
        .unwrap();

        let roots = discover_steam(&steam_env(base.path()));
        assert_eq!(roots.len(), 2);
        assert!(roots.iter().all(|r| r.kind == LauncherKind::Steam));

        let cyberpunk = roots.iter().find(|r| r.display_name == "Cyberpunk 2077").unwrap();
        assert_eq!(cyberpunk.app_id.as_deref(), Some("1091500"));
        assert!(roots.iter().any(|r| r.display_name == "Alan Wake 2"));
    }

    #[test]
    fn duplicate_base_dirs_scan_once() {
        let base = tempfile::tempdir().unwrap();
        fs::create_dir_all(Paths::with_base(base.path()).common_dir().join("Game")).unwrap();

        let env = DiscoveryEnv {
            steam_dirs: vec![base.path().to_path_buf(), base.path().to_path_buf()],
            ..Default::default()
        };
        assert_eq!(discover_steam(&env).len(), 1);
    }

    #[test]
    fn proton_prefix_games() {
        let base = tempfile::tempdir().unwrap();
        let paths = Paths::with_base(base.path());
        fs::create_dir_all(
            paths
                .prefix_drive_c("2050650")
                .join("Program Files")
                .join("Resident Evil 4"),
        )
        .unwrap();

        let roots = discover_proton(&steam_env(base.path()));
        assert_eq!(roots.len(), 1);
        assert_eq!(roots[0].kind, LauncherKind::ProtonPrefix);
        assert_eq!(roots[0].display_name, "Resident Evil 4");
        assert_eq!(roots[0].app_id.as_deref(), Some("2050650"));
    }

    #[test]
    fn no_steam_dirs() {
        assert!(discover_steam(&DiscoveryEnv::default()).is_empty());
        assert!(discover_proton(&DiscoveryEnv::default()).is_empty());
    }
}
