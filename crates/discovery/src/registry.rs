//! Read-only helpers over `HKEY_LOCAL_MACHINE`.

use winreg::RegKey;
use winreg::enums::{HKEY_LOCAL_MACHINE, KEY_READ};

/// Opens `SOFTWARE\WOW6432Node\<subkey>`, falling back to `SOFTWARE\<subkey>`.
pub(crate) fn open_software_key(subkey: &str) -> Option<RegKey> {
    let hklm = RegKey::predef(HKEY_LOCAL_MACHINE);
    [
        format!(r"SOFTWARE\WOW6432Node\{subkey}"),
        format!(r"SOFTWARE\{subkey}"),
    ]
    .iter()
    .find_map(|path| hklm.open_subkey_with_flags(path, KEY_READ).ok())
}

/// Reads a string value.
pub(crate) fn string_value(key: &RegKey, name: &str) -> Option<String> {
    key.get_value::<String, _>(name)
        .ok()
        .filter(|value| !value.trim().is_empty())
}

/// Returns every child key with its name.
pub(crate) fn child_keys(key: &RegKey) -> Vec<(String, RegKey)> {
    key.enum_keys()
        .flatten()
        .filter_map(|name| {
            key.open_subkey_with_flags(&name, KEY_READ)
                .ok()
                .map(|child| (name, child))
        })
        .collect()
}
