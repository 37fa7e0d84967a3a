use std::collections::HashMap;

use dllup_model::ModuleFamily;

/// Built-in filename table.
const DEFAULT_PATTERNS: &[(&str, ModuleFamily)] = &[
    ("nvngx_dlss.dll", ModuleFamily::Dlss),
    ("nvngx_dlssg.dll", ModuleFamily::DlssFrameGen),
    ("nvngx_dlssd.dll", ModuleFamily::DlssRayRecon),
    ("libxess.dll", ModuleFamily::Xess),
    ("libxess_dx11.dll", ModuleFamily::Xess),
    ("libxess_fg.dll", ModuleFamily::XessFrameGen),
    ("amd_fidelityfx_dx12.dll", ModuleFamily::Fsr),
    ("amd_fidelityfx_vk.dll", ModuleFamily::Fsr),
    ("dstorage.dll", ModuleFamily::DirectStorage),
    ("dstoragecore.dll", ModuleFamily::DirectStorage),
    ("sl.common.dll", ModuleFamily::Streamline),
    ("sl.dlss.dll", ModuleFamily::Streamline),
    ("sl.dlss_g.dll", ModuleFamily::Streamline),
    ("sl.interposer.dll", ModuleFamily::Streamline),
    ("sl.pcl.dll", ModuleFamily::Streamline),
    ("sl.reflex.dll", ModuleFamily::Streamline),
];

/// Case-insensitive exact filename to family table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModulePatterns {
    by_name: HashMap<String, ModuleFamily>,
}

impl Default for ModulePatterns {
    fn default() -> Self {
        let mut patterns = Self::empty();
        for (name, family) in DEFAULT_PATTERNS {
            patterns.insert(name, *family);
        }
        patterns
    }
}

impl ModulePatterns {
    /// Creates a table with no entries.
    pub fn empty() -> Self {
        Self {
            by_name: HashMap::new(),
        }
    }

    /// Adds or replaces the family for `file_name`.
    pub fn insert(&mut self, file_name: &str, family: ModuleFamily) {
        self.by_name.insert(file_name.to_lowercase(), family);
    }

    /// Returns the family a filename belongs to.
    pub fn family_for(&self, file_name: &str) -> Option<ModuleFamily> {
        self.by_name.get(&file_name.to_lowercase()).copied()
    }

    /// Returns the lowercase filenames of a family, sorted.
    pub fn file_names(&self, family: ModuleFamily) -> Vec<&str> {
        let mut names: Vec<&str> = self
            .by_name
            .iter()
            .filter(|(_, f)| **f == family)
            .map(|(name, _)| name.as_str())
            .collect();
        names.sort_unstable();
        names
    }

    pub fn len(&self) -> usize {
        self.by_name.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_name.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_cover_every_family() {
        let patterns = ModulePatterns::default();
        for family in ModuleFamily::all() {
            assert!(
                !patterns.file_names(*family).is_empty(),
                "no default filename for {family}"
            );
        }
        assert_eq!(patterns.len(), DEFAULT_PATTERNS.len());
    }

    #[test]
    fn lookup_is_case_insensitive() {
        let patterns = ModulePatterns::default();
        assert_eq!(patterns.family_for("NVNGX_DLSS.DLL"), Some(ModuleFamily::Dlss));
        assert_eq!(patterns.family_for("nvngx_dlssg.dll"), Some(ModuleFamily::DlssFrameGen));
        assert_eq!(patterns.family_for("sl.Interposer.dll"), Some(ModuleFamily::Streamline));
        assert_eq!(patterns.family_for("nvngx_dlss.dll.bak"), None);
        assert_eq!(patterns.family_for("d3d12.dll"), None);
    }

    #[test]
    fn insert_extends_and_overrides() {
        let mut patterns = ModulePatterns::empty();
        assert!(patterns.is_empty());
        patterns.insert("FFX_FSR3.dll", ModuleFamily::Fsr);
        assert_eq!(patterns.family_for("ffx_fsr3.dll"), Some(ModuleFamily::Fsr));
        assert_eq!(patterns.file_names(ModuleFamily::Fsr), vec!["ffx_fsr3.dll"]);
    }
}
