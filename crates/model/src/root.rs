use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Launcher ecosystem a game installation was discovered through.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LauncherKind {
    Steam,
    ProtonPrefix,
    WinePrefix,
    Epic,
    Gog,
    Ubisoft,
    Ea,
    BattleNet,
    XboxPc,
    Custom,
}

impl LauncherKind {
    /// Returns all launcher kinds.
    pub fn all() -> &'static [LauncherKind] {
        &[
            LauncherKind::Steam,
            LauncherKind::ProtonPrefix,
            LauncherKind::WinePrefix,
            LauncherKind::Epic,
            LauncherKind::Gog,
            LauncherKind::Ubisoft,
            LauncherKind::Ea,
            LauncherKind::BattleNet,
            LauncherKind::XboxPc,
            LauncherKind::Custom,
        ]
    }
}

impl fmt::Display for LauncherKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LauncherKind::Steam => write!(f, "Steam"),
            LauncherKind::ProtonPrefix => write!(f, "Proton"),
            LauncherKind::WinePrefix => write!(f, "Wine"),
            LauncherKind::Epic => write!(f, "Epic Games"),
            LauncherKind::Gog => write!(f, "GOG"),
            LauncherKind::Ubisoft => write!(f, "Ubisoft Connect"),
            LauncherKind::Ea => write!(f, "EA"),
            LauncherKind::BattleNet => write!(f, "Battle.net"),
            LauncherKind::XboxPc => write!(f, "Xbox"),
            LauncherKind::Custom => write!(f, "Custom"),
        }
    }
}

/// One discovered directory believed to hold one installed game.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct InstallationRoot {
    pub kind: LauncherKind,
    pub path: PathBuf,
    pub display_name: String,
    /// Launcher-specific id (Steam app id, Epic app name, GOG id).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub app_id: Option<String>,
}

impl InstallationRoot {
    /// Creates a root named after its last path component.
    pub fn new(kind: LauncherKind, path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let display_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.to_string_lossy().into_owned());
        Self {
            kind,
            path,
            display_name,
            app_id: None,
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        let name = name.into();
        if !name.trim().is_empty() {
            self.display_name = name;
        }
        self
    }

    pub fn with_app_id(mut self, app_id: impl Into<String>) -> Self {
        let app_id = app_id.into();
        if !app_id.is_empty() {
            self.app_id = Some(app_id);
        }
        self
    }

    /// Identifiers an exclusion entry may name exactly: display name, then
    /// the launcher id, then the directory name.
    pub fn identifiers(&self) -> Vec<&str> {
        let mut ids = vec![self.display_name.as_str()];
        if let Some(app_id) = &self.app_id {
            ids.push(app_id.as_str());
        }
        if let Some(dir) = self.path.file_name().and_then(|n| n.to_str()) {
            if dir != self.display_name {
                ids.push(dir);
            }
        }
        ids
    }
}
