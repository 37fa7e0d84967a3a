use dllup_model::{InstallationRoot, ModuleCandidate};
use tracing::warn;
use walkdir::WalkDir;

use crate::patterns::ModulePatterns;

/// Default directory depth searched below a root.
pub const DEFAULT_MAX_DEPTH: usize = 12;

/// Compatibility-layer and system directories never descended into.
const PRUNED_DIRS: &[&str] = &[
    "windows",
    "dosdevices",
    "system32",
    "syswow64",
    "winsxs",
    "$recycle.bin",
    "system volume information",
    "shadercache",
];

fn is_pruned(name: &std::ffi::OsStr) -> bool {
    let name = name.to_string_lossy().to_lowercase();
    PRUNED_DIRS.contains(&name.as_str())
}

/// Finds every module file under `root` whose name matches `patterns`.
///
/// Symlinks below the root are not followed. Unreadable entries are
/// logged and skipped. Results are ordered by path.
pub fn find_modules(
    root: &InstallationRoot,
    patterns: &ModulePatterns,
    max_depth: usize,
) -> Vec<ModuleCandidate> {
    let mut found = Vec::new();

    let walker = WalkDir::new(&root.path)
        .follow_links(false)
        .max_depth(max_depth)
        .into_iter()
        .filter_entry(|e| e.depth() == 0 || !(e.file_type().is_dir() && is_pruned(e.file_name())));

    for entry in walker {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                warn!(root = %root.path.display(), error = %e, "skipping unreadable entry");
                continue;
            }
        };
        if !entry.file_type().is_file() {
            continue;
        }
        let Some(family) = entry
            .file_name()
            .to_str()
            .and_then(|name| patterns.family_for(name))
        else {
            continue;
        };
        found.push(ModuleCandidate::new(root.clone(), entry.into_path(), family));
    }

    found.sort_by(|a, b| a.path.cmp(&b.path));
    found
}
