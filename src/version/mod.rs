// src/version/mod.rs

//! Version parsing, ordering, and requirement resolution.
//!
//! Versions follow the `major.minor.incremental[-qualifier]` convention.
//! A release (no qualifier) orders above every qualified version of the
//! same numeric tuple, known qualifiers order alpha < beta < snapshot,
//! and unrecognized qualifiers compare as equal-lowest.

use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};

// Qualifier precedence, lowest first. Anything not recognized ranks below alpha.
const RANK_UNKNOWN: u8 = 0;
const RANK_ALPHA: u8 = 1;
const RANK_BETA: u8 = 2;
const RANK_SNAPSHOT: u8 = 3;
const RANK_RELEASE: u8 = 4;

/// A parsed artifact version
#[derive(Debug, Clone)]
pub struct Version {
    pub major: u32,
    pub minor: u32,
    pub incremental: u32,
    pub qualifier: Option<String>,
    raw: String,
}

impl Version {
    /// Parse a version string. Parsing never fails: a string whose numeric
    /// part is not understood becomes a pure-qualifier version that compares
    /// as equal-lowest against other unparsable versions.
    pub fn parse(s: &str) -> Self {
        let s = s.trim();
        let (numeric, qualifier) = match s.find('-') {
            Some(pos) => (&s[..pos], Some(s[pos + 1..].to_string())),
            None => (s, None),
        };

        let parts: Vec<&str> = numeric.split('.').collect();
        let parsed: Option<Vec<u32>> = if parts.len() <= 3 {
            parts.iter().map(|p| p.parse::<u32>().ok()).collect()
        } else {
            None
        };

        match parsed {
            Some(nums) => Self {
                major: nums.first().copied().unwrap_or(0),
                minor: nums.get(1).copied().unwrap_or(0),
                incremental: nums.get(2).copied().unwrap_or(0),
                qualifier,
                raw: s.to_string(),
            },
            // Numeric part is not understood; the whole string is a qualifier.
            None => Self {
                major: 0,
                minor: 0,
                incremental: 0,
                qualifier: Some(s.to_string()),
                raw: s.to_string(),
            },
        }
    }

    fn qualifier_rank(&self) -> u8 {
        match &self.qualifier {
            None => RANK_RELEASE,
            Some(q) => {
                let q = q.to_lowercase();
                if q.contains("snapshot") {
                    RANK_SNAPSHOT
                } else if q.contains("beta") {
                    RANK_BETA
                } else if q.contains("alpha") {
                    RANK_ALPHA
                } else {
                    RANK_UNKNOWN
                }
            }
        }
    }

    pub fn is_snapshot(&self) -> bool {
        self.qualifier_rank() == RANK_SNAPSHOT
    }

    pub fn is_alpha(&self) -> bool {
        self.qualifier_rank() == RANK_ALPHA
    }

    pub fn is_beta(&self) -> bool {
        self.qualifier_rank() == RANK_BETA
    }

    pub fn higher(&self, other: &Version) -> bool {
        self > other
    }

    pub fn lower(&self, other: &Version) -> bool {
        self < other
    }

    /// Lossy conversion to a semver version for range matching. The
    /// qualifier becomes the pre-release component when it is a valid
    /// semver identifier, and is dropped otherwise.
    pub fn to_semver(&self) -> semver::Version {
        let mut v = semver::Version::new(
            u64::from(self.major),
            u64::from(self.minor),
            u64::from(self.incremental),
        );
        if let Some(q) = &self.qualifier {
            if let Ok(pre) = semver::Prerelease::new(q) {
                v.pre = pre;
            }
        }
        v
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.raw)
    }
}

impl Ord for Version {
    fn cmp(&self, other: &Self) -> Ordering {
        (self.major, self.minor, self.incremental, self.qualifier_rank()).cmp(&(
            other.major,
            other.minor,
            other.incremental,
            other.qualifier_rank(),
        ))
    }
}

impl PartialOrd for Version {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

// Equality follows the ordering, not the raw string, so that two
// unrecognized qualifiers compare as equal.
impl PartialEq for Version {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Version {}

impl Hash for Version {
    fn hash<H: Hasher>(&self, state: &mut H) {
        (self.major, self.minor, self.incremental, self.qualifier_rank()).hash(state);
    }
}

impl serde::Serialize for Version {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.raw)
    }
}

/// A declared version requirement, resolved against the artifact store
/// during distribution normalization
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VersionRequirement {
    Exact(Version),
    Latest,
    LatestSnapshot,
}

impl VersionRequirement {
    pub fn parse(s: &str) -> Self {
        match s.trim().to_uppercase().as_str() {
            "LATEST" => VersionRequirement::Latest,
            "LATEST-SNAPSHOT" => VersionRequirement::LatestSnapshot,
            _ => VersionRequirement::Exact(Version::parse(s)),
        }
    }

    pub fn is_keyword(&self) -> bool {
        !matches!(self, VersionRequirement::Exact(_))
    }
}

/// Pick the latest released version from a list: the highest version with
/// no qualifier, falling back to the highest pre-release when no release
/// exists. Returns None only when the list is empty.
pub fn latest_released(versions: &[Version]) -> Option<Version> {
    let mut sorted = versions.to_vec();
    sorted.sort();
    sorted.reverse();
    sorted
        .iter()
        .find(|v| v.qualifier.is_none())
        .or_else(|| sorted.first())
        .cloned()
}

/// Pick the latest snapshot version from a list, or None if there is none
pub fn latest_snapshot(versions: &[Version]) -> Option<Version> {
    let mut sorted = versions.to_vec();
    sorted.sort();
    sorted.reverse();
    sorted.into_iter().find(|v| v.is_snapshot())
}
