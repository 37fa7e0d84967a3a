//! Battle.net.

use std::path::{Path, PathBuf};

use dllup_model::{InstallationRoot, LauncherKind};
use tracing::warn;

use crate::DiscoveryError;
use crate::env::DiscoveryEnv;
use crate::fs_util::{read_text, subdirectories};

/// Marker file present in every Blizzard game folder.
const BUILD_INFO: &str = ".build.info";

fn parse_config(text: &str) -> Result<Option<PathBuf>, DiscoveryError> {
    let config: serde_json::Value = serde_json::from_str(text)?;
    Ok(config
        .pointer("/Client/Install/DefaultInstallPath")
        .and_then(serde_json::Value::as_str)
        .filter(|path| !path.is_empty())
        .map(PathBuf::from))
}

fn config_file(app_data: &Path) -> PathBuf {
    app_data.join("Battle.net").join("Battle.net.config")
}

pub(crate) fn discover(env: &DiscoveryEnv) -> Vec<InstallationRoot> {
    let mut dirs = Vec::new();

    if let Some(app_data) = env.app_data.as_deref() {
        let file = config_file(app_data);
        if file.exists() {
            match read_text(&file).and_then(|text| parse_config(&text)) {
                Ok(Some(dir)) => dirs.push(dir),
                Ok(None) => {}
                Err(e) => warn!(file = %file.display(), error = %e, "skipping battle.net config"),
            }
        }
    }
    for program_files in &env.program_files {
        if !dirs.contains(program_files) {
            dirs.push(program_files.clone());
        }
    }

    dirs.iter()
        .flat_map(|dir| subdirectories(dir))
        .filter(|game| game.join(BUILD_INFO).is_file())
        .map(|game| InstallationRoot::new(LauncherKind::BattleNet, game))
        .collect()
}

#[cfg(test)]
mod tests {
    use std::fs;

    use super::*;

    #[test]
    fn config_install_path() {
        let text = r#"{"Client":{"Install":{"DefaultInstallPath":"D:/Blizzard"}}}"#;
        assert_eq!(parse_config(text).unwrap(), Some(PathBuf::from("D:/Blizzard")));
        assert_eq!(parse_config(r#"{"Client":{}}"#).unwrap(), None);
        assert!(parse_config("nope").is_err());
    }

    #[test]
    fn only_folders_with_build_info() {
        let app_data = tempfile::tempdir().unwrap();
        let library = tempfile::tempdir().unwrap();
        fs::create_dir_all(library.path().join("Diablo IV")).unwrap();
        fs::write(library.path().join("Diablo IV").join(BUILD_INFO), "").unwrap();
        fs::create_dir_all(library.path().join("Random Tool")).unwrap();

        let file = config_file(app_data.path());
        fs::create_dir_all(file.parent().unwrap()).unwrap();
        let config = serde_json::json!({
            "Client": { "Install": { "DefaultInstallPath": library.path() } }
        });
        fs::write(&file, config.to_string()).unwrap();

        let env = DiscoveryEnv {
            app_data: Some(app_data.path().to_path_buf()),
            ..Default::default()
        };
        let roots = discover(&env);
        assert_eq!(roots.len(), 1);
        assert_eq!(roots[0].display_name, "Diablo IV");
        assert_eq!(roots[0].kind, LauncherKind::BattleNet);
    }
}
