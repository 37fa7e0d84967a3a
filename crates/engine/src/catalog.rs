use std::collections::HashMap;
use std::fs;
use std::path::Path;

use dllup_discovery::ModulePatterns;
use dllup_model::{ModuleCandidate, ModuleFamily, PayloadRef, VersionTag};
use tracing::{debug, warn};

/// Replacement offered for a module.
#[derive(Debug, Clone)]
pub struct CatalogEntry {
    pub version: VersionTag,
    pub payload: PayloadRef,
}

impl CatalogEntry {
    pub fn new(version: VersionTag, payload: PayloadRef) -> Self {
        Self { version, payload }
    }
}

/// Known replacement payloads.
///
/// Lookup tries the module's file name first, then its family. Families
/// spread over several files (Streamline, DirectStorage) need per-file
/// entries.
#[derive(Debug, Clone, Default)]
pub struct ReplacementCatalog {
    by_family: HashMap<ModuleFamily, CatalogEntry>,
    by_file: HashMap<String, CatalogEntry>,
}

impl ReplacementCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_family(&mut self, family: ModuleFamily, entry: CatalogEntry) {
        self.by_family.insert(family, entry);
    }

    pub fn insert_file(&mut self, file_name: &str, entry: CatalogEntry) {
        self.by_file.insert(file_name.to_lowercase(), entry);
    }

    pub fn lookup(&self, candidate: &ModuleCandidate) -> Option<&CatalogEntry> {
        self.by_file
            .get(&candidate.file_name().to_lowercase())
            .or_else(|| self.by_family.get(&candidate.family))
    }

    pub fn len(&self) -> usize {
        self.by_family.len() + self.by_file.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_family.is_empty() && self.by_file.is_empty()
    }

    /// Builds a catalog from the module files directly inside `dir`.
    ///
    /// Only files whose names are known to `patterns` are considered. A
    /// payload without a readable version is left out with a warning.
    pub fn from_payload_dir(dir: &Path, patterns: &ModulePatterns) -> std::io::Result<Self> {
        let mut catalog = Self::new();
        let mut entries: Vec<_> = fs::read_dir(dir)?.flatten().map(|e| e.path()).collect();
        entries.sort();

        for path in entries {
            if !path.is_file() {
                continue;
            }
            let Some(name) = path.file_name().map(|n| n.to_string_lossy().into_owned()) else {
                continue;
            };
            let Some(family) = patterns.family_for(&name) else {
                continue;
            };
            match dllup_pe_version::read_version(&path) {
                Some(version) => {
                    debug!(file = %name, %family, %version, "payload registered");
                    catalog.insert_file(&name, CatalogEntry::new(version, PayloadRef::File(path)));
                }
                None => warn!(path = %path.display(), "payload has no readable version, ignored"),
            }
        }
        Ok(catalog)
    }
}
