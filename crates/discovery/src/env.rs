use std::collections::HashMap;
use std::path::PathBuf;

use dllup_model::LauncherKind;

/// Filesystem anchors the launcher strategies search from.
///
/// Everything a strategy reads is reachable from here, so tests build an
/// environment over a temp dir instead of touching the real machine.
#[derive(Debug, Clone, Default)]
pub struct DiscoveryEnv {
    /// User home directory.
    pub home: Option<PathBuf>,
    /// `%ProgramData%`.
    pub program_data: Option<PathBuf>,
    /// Roaming application data: `%APPDATA%`, or the XDG config dir.
    pub app_data: Option<PathBuf>,
    /// `%LOCALAPPDATA%`.
    pub local_app_data: Option<PathBuf>,
    /// `Program Files` directories.
    pub program_files: Vec<PathBuf>,
    /// Drive roots searched for `.GamingRoot`.
    pub drive_roots: Vec<PathBuf>,
    /// Steam base directories.
    pub steam_dirs: Vec<PathBuf>,
    /// User-configured library folders per launcher; each subdirectory is a root.
    pub library_overrides: HashMap<LauncherKind, Vec<PathBuf>>,
    /// User folders added verbatim as custom roots.
    pub custom_folders: Vec<PathBuf>,
    /// Whether strategies may read the Windows registry.
    pub registry: bool,
}

impl DiscoveryEnv {
    /// Fills the anchors from the process environment.
    pub fn detect() -> Self {
        let var = |name: &str| std::env::var_os(name).map(PathBuf::from);

        let home = var("HOME").or_else(|| var("USERPROFILE"));
        let app_data = var("APPDATA")
            .or_else(|| var("XDG_CONFIG_HOME"))
            .or_else(|| home.as_ref().map(|h| h.join(".config")));

        let program_files: Vec<PathBuf> = ["ProgramFiles", "ProgramFiles(x86)"]
            .iter()
            .filter_map(|name| var(name))
            .fold(Vec::new(), |mut acc, dir| {
                if !acc.contains(&dir) {
                    acc.push(dir);
                }
                acc
            });

        Self {
            home,
            program_data: var("ProgramData"),
            app_data,
            local_app_data: var("LOCALAPPDATA"),
            program_files,
            drive_roots: drive_roots(),
            steam_dirs: dllup_steam::detect_base_dirs(),
            library_overrides: HashMap::new(),
            custom_folders: Vec::new(),
            registry: cfg!(windows),
        }
    }

    /// Adds a user library folder for `kind`.
    pub fn add_library_override(&mut self, kind: LauncherKind, dir: impl Into<PathBuf>) {
        self.library_overrides
            .entry(kind)
            .or_default()
            .push(dir.into());
    }

    /// Returns the configured library folders for `kind`.
    pub fn library_overrides_for(&self, kind: LauncherKind) -> &[PathBuf] {
        self.library_overrides
            .get(&kind)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }
}

#[cfg(windows)]
fn drive_roots() -> Vec<PathBuf> {
    (b'A'..=b'Z')
        .map(|letter| PathBuf::from(format!("{}:\\", letter as char)))
        .filter(|root| root.is_dir())
        .collect()
}

#[cfg(not(windows))]
fn drive_roots() -> Vec<PathBuf> {
    Vec::new()
}
