//! Dotted numeric implementation versions (spec.md §3: "a dotted numeric
//! sequence with ordering defined elementwise").

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

/// A version such as `1.0` or `2.10.3`. Segments compare elementwise;
/// a missing trailing segment is treated as `0`, so `1.0` and `1.0.0`
/// are equal.
#[derive(Debug, Clone, Eq, PartialEq, Hash, Default)]
pub struct Version(Vec<u64>);

impl Version {
    pub fn new(segments: impl Into<Vec<u64>>) -> Self {
        Version(segments.into())
    }

    pub fn segments(&self) -> &[u64] {
        &self.0
    }
}

impl FromStr for Version {
    type Err = VersionParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.is_empty() {
            return Err(VersionParseError(s.to_string()));
        }
        let mut segments = Vec::new();
        for part in s.split('.') {
            if part.is_empty() {
                return Err(VersionParseError(s.to_string()));
            }
            let n: u64 = part
                .parse()
                .map_err(|_| VersionParseError(s.to_string()))?;
            segments.push(n);
        }
        Ok(Version(segments))
    }
}

#[derive(Debug, Clone, thiserror::Error)]
#[error("malformed version {0:?}, expected dotted numeric segments")]
pub struct VersionParseError(String);

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = self
            .0
            .iter()
            .map(u64::to_string)
            .collect::<Vec<_>>()
            .join(".");
        write!(f, "{text}")
    }
}

impl PartialOrd for Version {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Version {
    fn cmp(&self, other: &Self) -> Ordering {
        let len = self.0.len().max(other.0.len());
        for i in 0..len {
            let a = self.0.get(i).copied().unwrap_or(0);
            let b = other.0.get(i).copied().unwrap_or(0);
            match a.cmp(&b) {
                Ordering::Equal => continue,
                other => return other,
            }
        }
        Ordering::Equal
    }
}
