use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use dllup_model::{LauncherKind, ModuleFamily, VersionTag};
use serde::{Deserialize, Serialize};

/// Metadata of one stored original, persisted as the blob's sidecar.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackupRecord {
    pub id: String,
    /// Display name of the owning game.
    pub game: String,
    pub launcher: LauncherKind,
    /// Installation root the module was found under.
    pub root: PathBuf,
    /// Module path relative to `root`.
    pub relative_path: PathBuf,
    pub family: ModuleFamily,
    pub file_name: String,
    /// Location of the stored copy.
    pub blob: PathBuf,
    /// Version read from the original right before it was backed up.
    pub version: VersionTag,
    /// Hex SHA-256 of the original content.
    pub sha256: String,
    pub size: u64,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub restored_at: Option<DateTime<Utc>>,
}

impl BackupRecord {
    /// Absolute path of the file this backup was taken from.
    pub fn target_path(&self) -> PathBuf {
        self.root.join(&self.relative_path)
    }

    /// Sidecar location for the blob.
    pub fn sidecar_path(&self) -> PathBuf {
        sidecar_for(&self.blob)
    }
}

pub(crate) fn sidecar_for(blob: &Path) -> PathBuf {
    blob.with_extension("json")
}

/// Stable directory-safe name: lowercase ASCII alphanumerics separated
/// by single dashes.
pub fn slugify(name: &str) -> String {
    let mut slug = String::with_capacity(name.len());
    for c in name.chars() {
        if c.is_ascii_alphanumeric() {
            slug.push(c.to_ascii_lowercase());
        } else if !slug.ends_with('-') {
            slug.push('-');
        }
    }
    let slug = slug.trim_matches('-');
    if slug.is_empty() {
        "unnamed".to_string()
    } else {
        slug.to_string()
    }
}
