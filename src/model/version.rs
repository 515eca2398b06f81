// src/model/version.rs
//! Rule definition versions

use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;

/// `major.minor` version of a rule definition.
///
/// Every accepted edit bumps `minor` by one, so a rule moves through
/// `1.0`, `1.1`, `1.2`, ... without floating point drift.
///
/// Serialized as `{major, minor}`. Human-readable input also accepts the
/// legacy number (`1.2`) and string (`"1.2"`) forms.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct RuleVersion {
    pub major: u32,
    pub minor: u32,
}

impl RuleVersion {
    /// Version assigned to a newly created rule
    pub const INITIAL: RuleVersion = RuleVersion { major: 1, minor: 0 };

    pub fn new(major: u32, minor: u32) -> Self {
        Self { major, minor }
    }

    /// Version following an edit
    pub fn next(self) -> Self {
        Self {
            major: self.major,
            minor: self.minor.saturating_add(1),
        }
    }
}

impl std::str::FromStr for RuleVersion {
    type Err = String;

    /// Parse `major` or `major.minor`. The minor part is read as decimal
    /// digits, so `1.2` is `{1, 2}` and `1.10` is `{1, 10}`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let (major, minor) = match s.split_once('.') {
            Some((major, minor)) => (major, minor),
            None => (s, "0"),
        };
        let major = major
            .parse::<u32>()
            .map_err(|_| format!("invalid rule version `{}`", s))?;
        let minor = minor
            .parse::<u32>()
            .map_err(|_| format!("invalid rule version `{}`", s))?;
        Ok(Self { major, minor })
    }
}

// Binary snapshots always carry the struct form
#[derive(Deserialize)]
struct VersionParts {
    major: u32,
    minor: u32,
}

impl<'de> Deserialize<'de> for RuleVersion {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        if !deserializer.is_human_readable() {
            let parts = VersionParts::deserialize(deserializer)?;
            return Ok(Self::new(parts.major, parts.minor));
        }

        match serde_json::Value::deserialize(deserializer)? {
            // Shortest decimal rendering of the number, e.g. `1.2`
            serde_json::Value::Number(n) => n.to_string().parse().map_err(D::Error::custom),
            serde_json::Value::String(s) => s.parse().map_err(D::Error::custom),
            other => {
                let parts = VersionParts::deserialize(other).map_err(D::Error::custom)?;
                Ok(Self::new(parts.major, parts.minor))
            }
        }
    }
}

impl Default for RuleVersion {
    fn default() -> Self {
        Self::INITIAL
    }
}

impl fmt::Display for RuleVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.major, self.minor)
    }
}
