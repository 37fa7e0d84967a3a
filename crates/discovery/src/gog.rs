//! GOG Galaxy registry entries and Heroic's GOG install list.

use std::path::{Path, PathBuf};

use dllup_model::{InstallationRoot, LauncherKind};
use serde::Deserialize;
use tracing::warn;

use crate::DiscoveryError;
use crate::env::DiscoveryEnv;
use crate::fs_util::read_text;

#[derive(Debug, Deserialize)]
struct HeroicInstalled {
    #[serde(default)]
    installed: Vec<HeroicGame>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct HeroicGame {
    #[serde(default)]
    app_name: Option<String>,
    #[serde(default, rename = "install_path")]
    install_path: Option<String>,
}

fn parse_heroic(text: &str) -> Result<Vec<InstallationRoot>, DiscoveryError> {
    let list: HeroicInstalled = serde_json::from_str(text)?;
    Ok(list
        .installed
        .into_iter()
        .filter_map(|game| {
            let path = game.install_path.filter(|p| !p.is_empty())?;
            let root = InstallationRoot::new(LauncherKind::Gog, path);
            Some(match game.app_name {
                Some(id) => root.with_app_id(id),
                None => root,
            })
        })
        .collect())
}

fn heroic_file(app_data: &Path) -> PathBuf {
    app_data
        .join("heroic")
        .join("gog_store")
        .join("installed.json")
}

#[cfg(windows)]
fn registry_roots() -> Vec<InstallationRoot> {
    use crate::registry::{child_keys, open_software_key, string_value};

    let Some(games) = open_software_key(r"GOG.com\Games") else {
        return Vec::new();
    };
    child_keys(&games)
        .into_iter()
        .filter_map(|(id, key)| {
            let path = string_value(&key, "path")?;
            let root = InstallationRoot::new(LauncherKind::Gog, path)
                .with_app_id(string_value(&key, "gameID").unwrap_or(id));
            Some(match string_value(&key, "gameName") {
                Some(name) => root.with_name(name),
                None => root,
            })
        })
        .collect()
}

#[cfg(not(windows))]
fn registry_roots() -> Vec<InstallationRoot> {
    Vec::new()
}

pub(crate) fn discover(env: &DiscoveryEnv) -> Vec<InstallationRoot> {
    let mut roots = if env.registry {
        registry_roots()
    } else {
        Vec::new()
    };

    if let Some(app_data) = env.app_data.as_deref() {
        let file = heroic_file(app_data);
        if file.exists() {
            match read_text(&file).and_then(|text| parse_heroic(&text)) {
                Ok(found) => roots.extend(found),
                Err(e) => warn!(file = %file.display(), error = %e, "skipping heroic gog list"),
            }
        }
    }

    roots.retain(|root| root.path.is_dir());
    roots
}
