use dllup_model::InstallationRoot;
use tracing::warn;

use crate::overrides::UserOverrides;
use crate::pattern::Pattern;
use crate::table::ExclusionTable;

/// Verdict for one installation root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Eligibility {
    pub eligible: bool,
    pub reason: Option<String>,
}

impl Eligibility {
    fn eligible(reason: Option<String>) -> Self {
        Self {
            eligible: true,
            reason,
        }
    }

    fn excluded(reason: String) -> Self {
        Self {
            eligible: false,
            reason: Some(reason),
        }
    }
}

#[derive(Debug, Clone)]
struct Override {
    pattern: Pattern,
    source: String,
    include: bool,
}

/// Combines the exclusion table with the user's overrides.
///
/// Precedence, first match wins: exact user override, exact table row,
/// broad (glob or path prefix) user override, broad table row. Within one
/// tier an exclude beats an include.
#[derive(Debug, Clone, Default)]
pub struct ExclusionFilter {
    table: ExclusionTable,
    overrides: Vec<Override>,
}

impl ExclusionFilter {
    pub fn new(table: ExclusionTable, overrides: &UserOverrides) -> Self {
        let includes = overrides.includes().iter().map(|p| (p, true));
        let excludes = overrides.excludes().iter().map(|p| (p, false));

        let overrides = includes
            .chain(excludes)
            .filter_map(|(source, include)| match Pattern::parse(source) {
                Ok(pattern) => Some(Override {
                    pattern,
                    source: source.clone(),
                    include,
                }),
                Err(e) => {
                    warn!(error = %e, "ignoring user override");
                    None
                }
            })
            .collect();

        Self { table, overrides }
    }

    /// Decides whether `root` may be updated.
    pub fn evaluate(&self, root: &InstallationRoot) -> Eligibility {
        for exact in [true, false] {
            if let Some(verdict) = self.override_verdict(root, exact) {
                return verdict;
            }
            if let Some(verdict) = self.table_verdict(root, exact) {
                return verdict;
            }
        }
        Eligibility::eligible(None)
    }

    fn override_verdict(&self, root: &InstallationRoot, exact: bool) -> Option<Eligibility> {
        let mut matched = self
            .overrides
            .iter()
            .filter(|o| o.pattern.is_exact() == exact && o.pattern.matches(root));

        let first = matched.next()?;
        let chosen = if first.include {
            matched.find(|o| !o.include).unwrap_or(first)
        } else {
            first
        };

        Some(if chosen.include {
            Eligibility::eligible(Some(format!(
                "included by user override '{}'",
                chosen.source
            )))
        } else {
            Eligibility::excluded(format!("excluded by user override '{}'", chosen.source))
        })
    }

    fn table_verdict(&self, root: &InstallationRoot, exact: bool) -> Option<Eligibility> {
        self.table
            .rows()
            .iter()
            .find(|(pattern, _)| pattern.is_exact() == exact && pattern.matches(root))
            .map(|(_, entry)| {
                let reason = match &entry.reason {
                    Some(reason) => format!("excluded: {reason}"),
                    None => format!("excluded by table entry '{}'", entry.pattern),
                };
                Eligibility::excluded(reason)
            })
    }
}
