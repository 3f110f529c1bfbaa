//! Git version strings and the feature probes derived from them

use semver::Version;
use serde::Serialize;
use std::cmp::Ordering;
use std::fmt;

use super::error::ParseError;

/// Literal that `git version` prints ahead of the version number
pub const VERSION_PREFIX: &str = "git version ";

/// Strip the fixed prefix from the first line of `git version` output
pub fn parse_version_line(line: &str) -> String {
    line.strip_prefix(VERSION_PREFIX).unwrap_or(line).to_string()
}

/// A git release as reported by `git version`, e.g. `2.39.2 (Apple Git-143)`
/// or `2.40.1.windows.1`; only the leading numeric components take part in
/// comparisons.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GitVersion {
    raw: String,
    #[serde(skip)]
    version: Version,
}

impl GitVersion {
    pub fn parse(raw: &str) -> Result<Self, ParseError> {
        let unrecognized = || ParseError::UnrecognizedVersion {
            line: raw.to_string(),
        };

        let token = raw.split_whitespace().next().ok_or_else(unrecognized)?;
        let numbers: Vec<u64> = token
            .split('.')
            .map_while(|part| part.parse::<u64>().ok())
            .collect();

        let (major, minor, patch) = match numbers.as_slice() {
            [] => return Err(unrecognized()),
            [major] => (*major, 0, 0),
            [major, minor] => (*major, *minor, 0),
            [major, minor, patch, ..] => (*major, *minor, *patch),
        };

        Ok(Self {
            raw: raw.to_string(),
            version: Version::new(major, minor, patch),
        })
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }

    pub fn at_least(&self, major: u64, minor: u64, patch: u64) -> bool {
        self.version >= Version::new(major, minor, patch)
    }

    pub fn supports_status_porcelain(&self) -> bool {
        self.at_least(1, 7, 0)
    }

    pub fn supports_log_no_abbrev_commit(&self) -> bool {
        self.at_least(1, 7, 6)
    }
}

impl PartialOrd for GitVersion {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for GitVersion {
    fn cmp(&self, other: &Self) -> Ordering {
        self.version.cmp(&other.version)
    }
}

impl fmt::Display for GitVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}
