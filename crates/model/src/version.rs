use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Four-part file version as stored in a module's fixed file info.
///
/// Ordering is purely numeric and component-wise (major first), so
/// `3.10.5.0 > 3.9.99.99`. An unreadable version is modelled as
/// `Option::<VersionTag>::None`, never as `0.0.0.0`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct VersionTag {
    pub major: u16,
    pub minor: u16,
    pub build: u16,
    pub revision: u16,
}

impl VersionTag {
    pub const fn new(major: u16, minor: u16, build: u16, revision: u16) -> Self {
        Self {
            major,
            minor,
            build,
            revision,
        }
    }

    /// Builds a tag from the two 32-bit halves of `VS_FIXEDFILEINFO`.
    pub const fn from_ms_ls(ms: u32, ls: u32) -> Self {
        Self {
            major: (ms >> 16) as u16,
            minor: (ms & 0xFFFF) as u16,
            build: (ls >> 16) as u16,
            revision: (ls & 0xFFFF) as u16,
        }
    }

    /// Returns the `(ms, ls)` pair this tag is encoded as in a version resource.
    pub const fn to_ms_ls(self) -> (u32, u32) {
        (
            ((self.major as u32) << 16) | self.minor as u32,
            ((self.build as u32) << 16) | self.revision as u32,
        )
    }
}

impl fmt::Display for VersionTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}.{}.{}.{}",
            self.major, self.minor, self.build, self.revision
        )
    }
}

/// Error returned when a version string cannot be parsed.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid version string '{0}'")]
pub struct ParseVersionError(pub String);

impl FromStr for VersionTag {
    type Err = ParseVersionError;

    /// Accepts `.` or `,` separated versions with one to four components.
    /// Missing trailing components are zero.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        if trimmed.is_empty() {
            return Err(ParseVersionError(s.to_string()));
        }

        let mut parts = [0u16; 4];
        let mut count = 0;
        for piece in trimmed.split(['.', ',']) {
            if count == 4 {
                return Err(ParseVersionError(s.to_string()));
            }
            parts[count] = piece
                .trim()
                .parse::<u16>()
                .map_err(|_| ParseVersionError(s.to_string()))?;
            count += 1;
        }

        Ok(Self::new(parts[0], parts[1], parts[2], parts[3]))
    }
}

impl TryFrom<String> for VersionTag {
    type Error = ParseVersionError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<VersionTag> for String {
    fn from(value: VersionTag) -> Self {
        value.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ordering_is_numeric_not_lexical() {
        assert!(VersionTag::new(3, 10, 5, 0) > VersionTag::new(3, 9, 99, 99));
        assert!(VersionTag::new(2, 0, 0, 0) > VersionTag::new(1, 65535, 65535, 65535));
        assert!(VersionTag::new(3, 7, 0, 1) > VersionTag::new(3, 7, 0, 0));
        assert_eq!(VersionTag::new(3, 7, 0, 0), VersionTag::new(3, 7, 0, 0));
    }

    #[test]
    fn ordering_matches_componentwise_comparison() {
        let samples = [
            VersionTag::new(0, 0, 0, 0),
            VersionTag::new(0, 0, 0, 9),
            VersionTag::new(0, 0, 10, 0),
            VersionTag::new(0, 2, 0, 0),
            VersionTag::new(1, 0, 0, 0),
            VersionTag::new(3, 9, 99, 99),
            VersionTag::new(3, 10, 5, 0),
        ];
        for a in &samples {
            for b in &samples {
                let expected = (a.major, a.minor, a.build, a.revision).cmp(&(
                    b.major, b.minor, b.build, b.revision,
                ));
                assert_eq!(a.cmp(b), expected, "{a} vs {b}");
            }
        }
    }

    #[test]
    fn ms_ls_encoding() {
        let tag = VersionTag::new(3, 10, 5, 0);
        let (ms, ls) = tag.to_ms_ls();
        assert_eq!(ms, 0x0003_000A);
        assert_eq!(ls, 0x0005_0000);
        assert_eq!(VersionTag::from_ms_ls(ms, ls), tag);
    }

    #[test]
    fn parse_dot_and_comma_forms() {
        assert_eq!(
            "3.17.10.0".parse::<VersionTag>().unwrap(),
            VersionTag::new(3, 17, 10, 0)
        );
        assert_eq!(
            "3, 7, 0, 0".parse::<VersionTag>().unwrap(),
            VersionTag::new(3, 7, 0, 0)
        );
        assert_eq!(
            "2.1".parse::<VersionTag>().unwrap(),
            VersionTag::new(2, 1, 0, 0)
        );
    }

    #[test]
    fn parse_rejects_garbage() {
        assert!("".parse::<VersionTag>().is_err());
        assert!("abc".parse::<VersionTag>().is_err());
        assert!("1.2.3.4.5".parse::<VersionTag>().is_err());
        assert!("1.70000".parse::<VersionTag>().is_err());
    }

    #[test]
    fn display_and_serde_use_dotted_form() {
        let tag = VersionTag::new(3, 7, 0, 0);
        assert_eq!(tag.to_string(), "3.7.0.0");
        let json = serde_json::to_string(&tag).unwrap();
        assert_eq!(json, "\"3.7.0.0\"");
        let back: VersionTag = serde_json::from_str(&json).unwrap();
        assert_eq!(back, tag);
    }
}
