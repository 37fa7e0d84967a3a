use serde::{Deserialize, Serialize};

/// User decisions that take precedence over the exclusion table.
///
/// A pattern is in at most one of the two lists.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserOverrides {
    #[serde(default)]
    include: Vec<String>,
    #[serde(default)]
    exclude: Vec<String>,
}

impl UserOverrides {
    pub fn new() -> Self {
        Self::default()
    }

    /// Forces games matching `pattern` to be eligible.
    pub fn include(&mut self, pattern: impl Into<String>) {
        let pattern = pattern.into();
        self.clear(&pattern);
        self.include.push(pattern);
    }

    /// Forces games matching `pattern` to be excluded.
    pub fn exclude(&mut self, pattern: impl Into<String>) {
        let pattern = pattern.into();
        self.clear(&pattern);
        self.exclude.push(pattern);
    }

    /// Removes any override for `pattern`. Returns true if one existed.
    pub fn clear(&mut self, pattern: &str) -> bool {
        let before = self.include.len() + self.exclude.len();
        self.include.retain(|p| !p.eq_ignore_ascii_case(pattern));
        self.exclude.retain(|p| !p.eq_ignore_ascii_case(pattern));
        before != self.include.len() + self.exclude.len()
    }

    pub fn includes(&self) -> &[String] {
        &self.include
    }

    pub fn excludes(&self) -> &[String] {
        &self.exclude
    }

    pub fn is_empty(&self) -> bool {
        self.include.is_empty() && self.exclude.is_empty()
    }
}
