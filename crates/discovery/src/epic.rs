//! Epic Games Launcher manifests and Legendary/Heroic `installed.json`.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use dllup_model::{InstallationRoot, LauncherKind};
use serde::Deserialize;
use tracing::{debug, warn};

use crate::DiscoveryError;
use crate::env::DiscoveryEnv;
use crate::fs_util::read_text;

/// An `.item` manifest written by the Epic Games Launcher.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct EpicItem {
    #[serde(default)]
    display_name: Option<String>,
    #[serde(default)]
    install_location: Option<String>,
    #[serde(default)]
    app_name: Option<String>,
}

/// An entry of Legendary's `installed.json`.
#[derive(Debug, Deserialize)]
struct LegendaryGame {
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    install_path: Option<String>,
}

fn parse_item(text: &str) -> Result<InstallationRoot, DiscoveryError> {
    let item: EpicItem = serde_json::from_str(text)?;
    let location = item
        .install_location
        .filter(|l| !l.is_empty())
        .ok_or_else(|| DiscoveryError::Manifest("missing InstallLocation".into()))?;

    let mut root = InstallationRoot::new(LauncherKind::Epic, location);
    if let Some(name) = item.display_name {
        root = root.with_name(name);
    }
    if let Some(app_name) = item.app_name {
        root = root.with_app_id(app_name);
    }
    Ok(root)
}

fn parse_legendary(text: &str) -> Result<Vec<InstallationRoot>, DiscoveryError> {
    let games: BTreeMap<String, LegendaryGame> = serde_json::from_str(text)?;
    Ok(games
        .into_iter()
        .filter_map(|(app_name, game)| {
            let path = game.install_path.filter(|p| !p.is_empty())?;
            let root = InstallationRoot::new(LauncherKind::Epic, path).with_app_id(app_name);
            Some(match game.title {
                Some(title) => root.with_name(title),
                None => root,
            })
        })
        .collect())
}

fn manifest_dir(program_data: &Path) -> PathBuf {
    program_data
        .join("Epic")
        .join("EpicGamesLauncher")
        .join("Data")
        .join("Manifests")
}

fn legendary_files(app_data: &Path) -> [PathBuf; 2] {
    [
        app_data.join("legendary").join("installed.json"),
        app_data
            .join("heroic")
            .join("legendaryConfig")
            .join("legendary")
            .join("installed.json"),
    ]
}

pub(crate) fn discover(env: &DiscoveryEnv) -> Vec<InstallationRoot> {
    let mut roots = Vec::new();

    if let Some(program_data) = env.program_data.as_deref() {
        let dir = manifest_dir(program_data);
        let mut items: Vec<PathBuf> = std::fs::read_dir(&dir)
            .into_iter()
            .flatten()
            .flatten()
            .map(|entry| entry.path())
            .filter(|path| path.extension().is_some_and(|ext| ext.eq_ignore_ascii_case("item")))
            .collect();
        items.sort();

        for item in items {
            match read_text(&item).and_then(|text| parse_item(&text)) {
                Ok(root) => roots.push(root),
                Err(e) => warn!(manifest = %item.display(), error = %e, "skipping epic manifest"),
            }
        }
    }

    if let Some(app_data) = env.app_data.as_deref() {
        for file in legendary_files(app_data) {
            if !file.exists() {
                continue;
            }
            match read_text(&file).and_then(|text| parse_legendary(&text)) {
                Ok(found) => roots.extend(found),
                Err(e) => warn!(file = %file.display(), error = %e, "skipping legendary install list"),
            }
        }
    }

    roots.retain(|root| {
        let exists = root.path.is_dir();
        if !exists {
            debug!(path = %root.path.display(), "epic install location missing");
        }
        exists
    });
    roots
}

#[cfg(test)]
mod tests {
    use std::fs;

    use super::*;

    #[test]
    fn parse_item_fields() {
        let root = parse_item(
            r#"{"FormatVersion":0,"DisplayName":"Fortnite","InstallLocation":"C:\\Games\\Fortnite","AppName":"Fortnite"}"#,
        )
        .unwrap();
        assert_eq!(root.display_name, "Fortnite");
        assert_eq!(root.app_id.as_deref(), Some("Fortnite"));
        assert_eq!(root.kind, LauncherKind::Epic);
    }

    #[test]
    fn parse_item_without_location() {
        assert!(matches!(
            parse_item(r#"{"DisplayName":"Nothing"}"#),
            Err(DiscoveryError::Manifest(_))
        ));
        assert!(matches!(parse_item("{not json"), Err(DiscoveryError::Json(_))));
    }

    #[test]
    fn discover_items_and_legendary() {
        let program_data = tempfile::tempdir().unwrap();
        let app_data = tempfile::tempdir().unwrap();
        let games = tempfile::tempdir().unwrap();
        let control = games.path().join("Control");
        let hades = games.path().join("Hades");
        fs::create_dir_all(&control).unwrap();
        fs::create_dir_all(&hades).unwrap();

        let manifests = manifest_dir(program_data.path());
        fs::create_dir_all(&manifests).unwrap();
        let item = serde_json::json!({
            "DisplayName": "Control",
            "InstallLocation": control,
            "AppName": "Calluna",
        });
        fs::write(manifests.join("A1.item"), item.to_string()).unwrap();
        fs::write(manifests.join("broken.item"), "{").unwrap();
        let gone = serde_json::json!({
            "DisplayName": "Uninstalled",
            "InstallLocation": games.path().join("Gone"),
        });
        fs::write(manifests.join("B2.item"), gone.to_string()).unwrap();

        let legendary = app_data.path().join("legendary");
        fs::create_dir_all(&legendary).unwrap();
        let installed = serde_json::json!({
            "Min": { "title": "Hades", "install_path": hades, "app_name": "Min" }
        });
        fs::write(legendary.join("installed.json"), installed.to_string()).unwrap();

        let env = DiscoveryEnv {
            program_data: Some(program_data.path().to_path_buf()),
            app_data: Some(app_data.path().to_path_buf()),
            ..Default::default()
        };
        let roots = discover(&env);
        let names: Vec<&str> = roots.iter().map(|r| r.display_name.as_str()).collect();
        assert_eq!(names, vec!["Control", "Hades"]);
        assert_eq!(roots[0].app_id.as_deref(), Some("Calluna"));
        assert_eq!(roots[1].app_id.as_deref(), Some("Min"));
    }
}
