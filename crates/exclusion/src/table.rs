use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::ExclusionError;
use crate::pattern::Pattern;

/// One row of the exclusion table as supplied by the caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExclusionEntry {
    pub pattern: String,
    #[serde(default)]
    pub reason: Option<String>,
}

impl ExclusionEntry {
    pub fn new(pattern: impl Into<String>, reason: Option<&str>) -> Self {
        Self {
            pattern: pattern.into(),
            reason: reason.map(str::to_string),
        }
    }
}

/// Compiled table of games that must not be updated.
#[derive(Debug, Clone, Default)]
pub struct ExclusionTable {
    rows: Vec<(Pattern, ExclusionEntry)>,
}

impl ExclusionTable {
    /// Compiles already-parsed rows. Rows whose pattern does not compile
    /// are dropped with a warning.
    pub fn from_entries(entries: impl IntoIterator<Item = ExclusionEntry>) -> Self {
        let rows = entries
            .into_iter()
            .filter_map(|entry| match Pattern::parse(&entry.pattern) {
                Ok(pattern) => Some((pattern, entry)),
                Err(e) => {
                    warn!(error = %e, "dropping exclusion row");
                    None
                }
            })
            .collect::<Vec<_>>();
        debug!(rows = rows.len(), "exclusion table compiled");
        Self { rows }
    }

    /// Parses a JSON array of `{ "pattern": ..., "reason": ... }` rows.
    pub fn from_json(text: &str) -> Result<Self, ExclusionError> {
        let entries: Vec<ExclusionEntry> = serde_json::from_str(text)?;
        Ok(Self::from_entries(entries))
    }

    /// Loads a JSON table from disk.
    pub fn load(path: &Path) -> Result<Self, ExclusionError> {
        let text = fs::read_to_string(path)
            .map_err(|e| ExclusionError::Io(format!("failed to read {}: {e}", path.display())))?;
        Self::from_json(&text)
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub(crate) fn rows(&self) -> &[(Pattern, ExclusionEntry)] {
        &self.rows
    }
}
