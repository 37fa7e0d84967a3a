//! dllup configuration management.
//!
//! Configuration is stored as TOML:
//! - Linux: `~/.config/dllup/config.toml`
//! - Windows: `%APPDATA%/dllup/config.toml`

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use dllup_discovery::DEFAULT_MAX_DEPTH;
use dllup_exclusion::UserOverrides;
use dllup_model::{LauncherKind, ModuleFamily};
use serde::de::IntoDeserializer;
use serde::de::value::StrDeserializer;
use serde::{Deserialize, Serialize};

/// dllup configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Where original modules are backed up.
    #[serde(default = "default_backup_dir")]
    pub backup_dir: PathBuf,

    /// Updates running at the same time.
    #[serde(default = "default_workers")]
    pub workers: usize,

    /// Directory depth searched below each game root.
    #[serde(default = "default_max_depth")]
    pub max_depth: usize,

    /// Refuse to run when the backup disk has less than twice the size of
    /// the files about to be replaced.
    #[serde(default = "default_true")]
    pub check_space: bool,

    /// Extra replace attempts while a game or scanner holds a module open.
    #[serde(default = "default_lock_retries")]
    pub lock_retries: u32,

    /// Wait between those attempts, in milliseconds.
    #[serde(default = "default_lock_retry_delay_ms")]
    pub lock_retry_delay_ms: u64,

    /// Module families that may be updated.
    #[serde(default = "default_families")]
    pub enabled_families: Vec<ModuleFamily>,

    /// Extra directories, each holding one game.
    #[serde(default)]
    pub custom_folders: Vec<PathBuf>,

    /// JSON exclusion table (`[{"pattern": "...", "reason": "..."}]`).
    #[serde(default)]
    pub exclusion_file: Option<PathBuf>,

    /// Directory holding the replacement DLLs.
    #[serde(default)]
    pub payload_dir: Option<PathBuf>,

    /// Additional library directories per launcher (`steam`, `epic`, ...).
    #[serde(default)]
    pub library_overrides: BTreeMap<String, Vec<PathBuf>>,

    /// Additional file names to look for, mapped to their family.
    #[serde(default)]
    pub extra_patterns: BTreeMap<String, ModuleFamily>,

    /// Games the user forced in or out.
    #[serde(default)]
    pub overrides: UserOverrides,
}

fn default_backup_dir() -> PathBuf {
    data_dir().join("dllup").join("backups")
}

fn default_workers() -> usize {
    4
}

fn default_max_depth() -> usize {
    DEFAULT_MAX_DEPTH
}

fn default_lock_retries() -> u32 {
    3
}

fn default_lock_retry_delay_ms() -> u64 {
    2000
}

fn default_true() -> bool {
    true
}

fn default_families() -> Vec<ModuleFamily> {
    ModuleFamily::all().to_vec()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            backup_dir: default_backup_dir(),
            workers: default_workers(),
            max_depth: default_max_depth(),
            check_space: default_true(),
            lock_retries: default_lock_retries(),
            lock_retry_delay_ms: default_lock_retry_delay_ms(),
            enabled_families: default_families(),
            custom_folders: Vec::new(),
            exclusion_file: None,
            payload_dir: None,
            library_overrides: BTreeMap::new(),
            extra_patterns: BTreeMap::new(),
            overrides: UserOverrides::default(),
        }
    }
}

impl Config {
    /// Loads configuration from `path`, or creates a default there if not found.
    pub fn load_from(path: &Path) -> anyhow::Result<Self> {
        if path.exists() {
            let content = std::fs::read_to_string(path)?;
            let config: Config = toml::from_str(&content)?;
            Ok(config)
        } else {
            let config = Config::default();
            config.save_to(path)?;
            Ok(config)
        }
    }

    /// Saves the configuration to `path`.
    pub fn save_to(&self, path: &Path) -> anyhow::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;

        tracing::debug!(path = %path.display(), "configuration saved");
        Ok(())
    }

    /// Library overrides keyed by launcher. Unknown launcher names are
    /// reported and skipped.
    pub fn launcher_overrides(&self) -> Vec<(LauncherKind, &[PathBuf])> {
        self.library_overrides
            .iter()
            .filter_map(|(name, dirs)| match parse_launcher(name) {
                Some(kind) => Some((kind, dirs.as_slice())),
                None => {
                    tracing::warn!(launcher = %name, "unknown launcher in library_overrides");
                    None
                }
            })
            .collect()
    }
}

fn parse_launcher(name: &str) -> Option<LauncherKind> {
    let name = name.trim().to_ascii_lowercase().replace(['-', ' '], "_");
    let de: StrDeserializer<'_, serde::de::value::Error> = name.as_str().into_deserializer();
    LauncherKind::deserialize(de).ok()
}

/// Returns the platform-specific configuration file path.
pub fn config_path() -> anyhow::Result<PathBuf> {
    #[cfg(target_os = "linux")]
    {
        let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".into());
        Ok(PathBuf::from(home)
            .join(".config")
            .join("dllup")
            .join("config.toml"))
    }

    #[cfg(target_os = "windows")]
    {
        let appdata =
            std::env::var("APPDATA").unwrap_or_else(|_| "C:\\Users\\Default\\AppData".into());
        Ok(PathBuf::from(appdata).join("dllup").join("config.toml"))
    }

    #[cfg(not(any(target_os = "linux", target_os = "windows")))]
    {
        Ok(PathBuf::from("/tmp/dllup/config.toml"))
    }
}

fn data_dir() -> PathBuf {
    #[cfg(target_os = "windows")]
    {
        let local = std::env::var("LOCALAPPDATA")
            .unwrap_or_else(|_| "C:\\Users\\Default\\AppData\\Local".into());
        PathBuf::from(local)
    }

    #[cfg(not(target_os = "windows"))]
    {
        let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".into());
        PathBuf::from(home).join(".local").join("share")
    }
}
