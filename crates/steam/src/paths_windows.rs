use std::path::PathBuf;

use winreg::RegKey;
use winreg::enums::{HKEY_CURRENT_USER, HKEY_LOCAL_MACHINE};

#[derive(Debug, Clone, Copy)]
enum Hive {
    LocalMachine,
    CurrentUser,
}

/// Registry values that may name a Steam install, in lookup order.
///
/// The machine-wide keys hold `InstallPath` (32-bit view first); the
/// per-user key written by the client holds `SteamPath`.
const REGISTRY_VALUES: [(Hive, &str, &str); 3] = [
    (Hive::LocalMachine, r"SOFTWARE\Wow6432Node\Valve\Steam", "InstallPath"),
    (Hive::LocalMachine, r"SOFTWARE\Valve\Steam", "InstallPath"),
    (Hive::CurrentUser, r"Software\Valve\Steam", "SteamPath"),
];

/// Where the installer puts Steam when nothing else is recorded.
const DEFAULT_INSTALL: &str = r"C:\Program Files (x86)\Steam";

/// Returns every existing Steam base directory named by the registry,
/// falling back to the default install location.
pub(crate) fn get_base_dirs() -> Vec<PathBuf> {
    let recorded = REGISTRY_VALUES
        .iter()
        .filter_map(|&(hive, subkey, value)| read_registry_path(hive, subkey, value));
    let mut seen = Vec::new();
    let mut dirs = Vec::new();
    for raw in recorded.chain(std::iter::once(DEFAULT_INSTALL.to_string())) {
        let dir = normalize_registry_path(&raw);
        let key = dir.to_string_lossy().to_lowercase();
        if seen.contains(&key) || !dir.is_dir() {
            continue;
        }
        seen.push(key);
        dirs.push(dir);
    }
    dirs
}

fn read_registry_path(hive: Hive, subkey: &str, value: &str) -> Option<String> {
    let root = match hive {
        Hive::LocalMachine => RegKey::predef(HKEY_LOCAL_MACHINE),
        Hive::CurrentUser => RegKey::predef(HKEY_CURRENT_USER),
    };
    let key = root.open_subkey(subkey).ok()?;
    let path: String = key.get_value(value).ok()?;
    tracing::debug!(subkey, value, path = %path, "steam registry entry");
    Some(path)
}

/// `SteamPath` is stored with forward slashes and a lowercase drive.
fn normalize_registry_path(raw: &str) -> PathBuf {
    let trimmed = raw.trim().trim_end_matches(['/', '\\']);
    PathBuf::from(trimmed.replace('/', "\\"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn steam_path_separators_are_normalized() {
        assert_eq!(
            normalize_registry_path("c:/program files (x86)/steam/"),
            PathBuf::from(r"c:\program files (x86)\steam")
        );
        assert_eq!(
            normalize_registry_path(r"D:\Steam"),
            PathBuf::from(r"D:\Steam")
        );
    }

    #[test]
    fn base_dirs_exist_and_are_distinct() {
        let dirs = get_base_dirs();
        assert!(dirs.iter().all(|d| d.is_dir()));
        let mut keys: Vec<_> = dirs
            .iter()
            .map(|d| d.to_string_lossy().to_lowercase())
            .collect();
        keys.dedup();
        assert_eq!(keys.len(), dirs.len());
    }
}
