use std::collections::HashSet;

use dllup_model::{ModuleCandidate, ModuleFamily, UpdateAction, UpdatePlanEntry, VersionTag};

use crate::catalog::ReplacementCatalog;

/// Oldest DLSS super-resolution major version that can be swapped in place.
const MIN_DLSS_MAJOR: u16 = 2;

/// Families the user allows to be updated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Preferences {
    enabled: HashSet<ModuleFamily>,
}

impl Default for Preferences {
    fn default() -> Self {
        Self::only(ModuleFamily::all().iter().copied())
    }
}

impl Preferences {
    /// Enables exactly `families`.
    pub fn only(families: impl IntoIterator<Item = ModuleFamily>) -> Self {
        Self {
            enabled: families.into_iter().collect(),
        }
    }

    pub fn disable(&mut self, family: ModuleFamily) {
        self.enabled.remove(&family);
    }

    pub fn is_enabled(&self, family: ModuleFamily) -> bool {
        self.enabled.contains(&family)
    }
}

/// A module found by a scan, with what the planner needs to decide on it.
#[derive(Debug, Clone)]
pub struct ScannedModule {
    pub candidate: ModuleCandidate,
    /// Installed version; `None` when unreadable or never read.
    pub current: Option<VersionTag>,
    /// Set when the owning root was excluded.
    pub excluded: Option<String>,
}

/// Decides one action per scanned module.
#[derive(Debug, Clone, Copy)]
pub struct UpdatePlanner<'a> {
    catalog: &'a ReplacementCatalog,
    preferences: &'a Preferences,
}

impl<'a> UpdatePlanner<'a> {
    pub fn new(catalog: &'a ReplacementCatalog, preferences: &'a Preferences) -> Self {
        Self {
            catalog,
            preferences,
        }
    }

    /// Builds the plan, ordered by root path then module path, with
    /// indices assigned in that order.
    pub fn plan(&self, modules: impl IntoIterator<Item = ScannedModule>) -> Vec<UpdatePlanEntry> {
        let mut entries: Vec<UpdatePlanEntry> =
            modules.into_iter().map(|m| self.decide(m)).collect();
        entries.sort_by(|a, b| {
            a.candidate
                .root
                .path
                .cmp(&b.candidate.root.path)
                .then_with(|| a.candidate.path.cmp(&b.candidate.path))
        });
        for (index, entry) in entries.iter_mut().enumerate() {
            entry.index = index;
        }
        entries
    }

    /// Plans a single module. The returned entry has index 0.
    pub fn decide(&self, module: ScannedModule) -> UpdatePlanEntry {
        let ScannedModule {
            candidate,
            current,
            excluded,
        } = module;
        let replacement = self.catalog.lookup(&candidate);
        let target = replacement.map(|r| r.version);
        let payload = replacement.map(|r| r.payload.clone());

        let action = if let Some(reason) = excluded {
            UpdateAction::SkipExcluded { reason }
        } else if !self.preferences.is_enabled(candidate.family) {
            UpdateAction::SkipExcluded {
                reason: format!("{} updates are disabled", candidate.family),
            }
        } else {
            match (current, target) {
                (None, _) => UpdateAction::SkipUnknownVersion {
                    reason: "installed version could not be read".into(),
                },
                (Some(_), None) => UpdateAction::SkipUnknownVersion {
                    reason: "no replacement available".into(),
                },
                (Some(current), Some(_))
                    if candidate.family == ModuleFamily::Dlss && current.major < MIN_DLSS_MAJOR =>
                {
                    UpdateAction::SkipIncompatible {
                        reason: format!("DLSS {current} cannot be upgraded in place"),
                    }
                }
                (Some(current), Some(target)) if current >= target => UpdateAction::SkipUpToDate,
                (Some(_), Some(_)) => UpdateAction::Update,
            }
        };

        UpdatePlanEntry {
            index: 0,
            candidate,
            current,
            target,
            payload,
            action,
        }
    }
}
