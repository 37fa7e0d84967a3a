use std::path::Path;

use dllup_model::InstallationRoot;
use globset::{GlobBuilder, GlobMatcher};

use crate::ExclusionError;

/// A compiled exclusion pattern. Matching is case-insensitive.
#[derive(Debug, Clone)]
pub enum Pattern {
    /// Equals one of the root's identifiers.
    Exact(String),
    /// Glob over the identifiers and the root path.
    Glob { source: String, matcher: GlobMatcher },
    /// The root path is this directory or lies below it.
    PathPrefix(String),
}

impl Pattern {
    /// Classifies and compiles a pattern string.
    ///
    /// Any of `*?[` makes a glob; an absolute path makes a prefix;
    /// anything else is an exact identifier.
    pub fn parse(raw: &str) -> Result<Self, ExclusionError> {
        let raw = raw.trim();
        if raw.is_empty() {
            return Err(ExclusionError::InvalidPattern {
                pattern: raw.to_string(),
                message: "empty pattern".into(),
            });
        }

        if raw.contains(['*', '?', '[']) {
            let matcher = GlobBuilder::new(&normalize_separators(raw))
                .case_insensitive(true)
                .build()
                .map_err(|e| ExclusionError::InvalidPattern {
                    pattern: raw.to_string(),
                    message: e.to_string(),
                })?
                .compile_matcher();
            return Ok(Pattern::Glob {
                source: raw.to_string(),
                matcher,
            });
        }

        if is_absolute(raw) {
            return Ok(Pattern::PathPrefix(normalize_path(raw)));
        }

        Ok(Pattern::Exact(raw.to_lowercase()))
    }

    /// True for exact identifiers, which take precedence over broad matches.
    pub fn is_exact(&self) -> bool {
        matches!(self, Pattern::Exact(_))
    }

    /// Returns true when the pattern names `root`.
    pub fn matches(&self, root: &InstallationRoot) -> bool {
        match self {
            Pattern::Exact(id) => root
                .identifiers()
                .iter()
                .any(|candidate| candidate.to_lowercase() == *id),
            Pattern::Glob { matcher, .. } => {
                root.identifiers()
                    .iter()
                    .any(|candidate| matcher.is_match(candidate))
                    || matcher.is_match(normalize_separators(&root.path.to_string_lossy()))
            }
            Pattern::PathPrefix(prefix) => {
                let path = normalize_path(&root.path.to_string_lossy());
                path == *prefix
                    || path
                        .strip_prefix(prefix.as_str())
                        .is_some_and(|rest| rest.starts_with('/'))
            }
        }
    }
}

fn is_absolute(raw: &str) -> bool {
    let bytes = raw.as_bytes();
    let drive = bytes.len() >= 3
        && bytes[0].is_ascii_alphabetic()
        && bytes[1] == b':'
        && matches!(bytes[2], b'\\' | b'/');
    drive || raw.starts_with("\\\\") || Path::new(raw).is_absolute() || raw.starts_with('/')
}

fn normalize_separators(raw: &str) -> String {
    raw.replace('\\', "/")
}

/// Lowercase, forward slashes, no trailing separator.
fn normalize_path(raw: &str) -> String {
    let normalized = normalize_separators(raw).to_lowercase();
    let trimmed = normalized.trim_end_matches('/');
    if trimmed.is_empty() {
        "/".to_string()
    } else {
        trimmed.to_string()
    }
}
