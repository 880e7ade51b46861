//! Semantic-version tag names.
//!
//! Releases are ordinary tags named `vMAJOR.MINOR.PATCH[-PRE]`. This module
//! parses and orders those names; storage goes through the same index as any
//! other tag.

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use crate::error::TagStoreError;

/// A `MAJOR.MINOR.PATCH[-PRE]` version. Build metadata is not supported.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct SemVer {
    pub major: u64,
    pub minor: u64,
    pub patch: u64,
    pub pre: Option<String>,
}

impl SemVer {
    pub fn new(major: u64, minor: u64, patch: u64) -> Self {
        Self {
            major,
            minor,
            patch,
            pre: None,
        }
    }

    pub fn with_pre(mut self, pre: impl Into<String>) -> Self {
        self.pre = Some(pre.into());
        self
    }

    /// Canonical tag name, always with a leading `v`.
    pub fn tag_name(&self) -> String {
        format!("v{self}")
    }

    /// Parse `1.2.3`, `v1.2.3`, or `v1.2.3-rc.1`.
    pub fn parse(s: &str) -> Result<Self, TagStoreError> {
        let invalid = |reason: &str| TagStoreError::InvalidTag {
            tag: s.to_string(),
            reason: format!("not a semantic version: {reason}"),
        };

        let body = s.strip_prefix('v').unwrap_or(s);
        let (core, pre) = match body.split_once('-') {
            Some((core, pre)) => (core, Some(pre)),
            None => (body, None),
        };

        let parts: Vec<&str> = core.split('.').collect();
        let [major, minor, patch] = parts.as_slice() else {
            return Err(invalid("expected three numeric components"));
        };
        let number = |p: &str| -> Result<u64, TagStoreError> {
            if p.is_empty() || !p.bytes().all(|b| b.is_ascii_digit()) {
                return Err(invalid("components must be digits"));
            }
            if p.len() > 1 && p.starts_with('0') {
                return Err(invalid("leading zero"));
            }
            p.parse().map_err(|_| invalid("component overflows"))
        };

        let pre = match pre {
            Some(pre) => {
                let ok = pre.split('.').all(|id| {
                    !id.is_empty() && id.bytes().all(|b| b.is_ascii_alphanumeric() || b == b'-')
                });
                if !ok {
                    return Err(invalid("bad pre-release identifier"));
                }
                Some(pre.to_string())
            }
            None => None,
        };

        Ok(Self {
            major: number(major)?,
            minor: number(minor)?,
            patch: number(patch)?,
            pre,
        })
    }
}

impl fmt::Display for SemVer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)?;
        if let Some(pre) = &self.pre {
            write!(f, "-{pre}")?;
        }
        Ok(())
    }
}

impl FromStr for SemVer {
    type Err = TagStoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl Ord for SemVer {
    fn cmp(&self, other: &Self) -> Ordering {
        (self.major, self.minor, self.patch)
            .cmp(&(other.major, other.minor, other.patch))
            .then_with(|| match (&self.pre, &other.pre) {
                (None, None) => Ordering::Equal,
                // A pre-release sorts before its release.
                (Some(_), None) => Ordering::Less,
                (None, Some(_)) => Ordering::Greater,
                (Some(a), Some(b)) => compare_pre(a, b),
            })
    }
}

impl PartialOrd for SemVer {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

fn compare_pre(a: &str, b: &str) -> Ordering {
    let mut left = a.split('.');
    let mut right = b.split('.');
    loop {
        match (left.next(), right.next()) {
            (None, None) => return Ordering::Equal,
            (None, Some(_)) => return Ordering::Less,
            (Some(_), None) => return Ordering::Greater,
            (Some(x), Some(y)) => {
                let ord = match (x.parse::<u64>(), y.parse::<u64>()) {
                    (Ok(m), Ok(n)) => m.cmp(&n),
                    (Ok(_), Err(_)) => Ordering::Less,
                    (Err(_), Ok(_)) => Ordering::Greater,
                    (Err(_), Err(_)) => x.cmp(y),
                };
                if ord != Ordering::Equal {
                    return ord;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_forms() {
        assert_eq!(SemVer::parse("1.2.3").unwrap(), SemVer::new(1, 2, 3));
        assert_eq!(SemVer::parse("v0.10.0").unwrap(), SemVer::new(0, 10, 0));
        assert_eq!(
            SemVer::parse("v2.0.0-rc.1").unwrap(),
            SemVer::new(2, 0, 0).with_pre("rc.1")
        );
    }

    #[test]
    fn rejects_non_versions() {
        for s in ["latest", "v1.2", "1.2.3.4", "v01.2.3", "1.x.3", "1.2.3-", "1.2.3-a..b", ""] {
            assert!(SemVer::parse(s).is_err(), "{s}");
        }
    }

    #[test]
    fn tag_name_is_canonical() {
        assert_eq!(SemVer::parse("1.0.0").unwrap().tag_name(), "v1.0.0");
        assert_eq!(SemVer::new(1, 0, 0).with_pre("beta").tag_name(), "v1.0.0-beta");
    }

    #[test]
    fn precedence() {
        let ordered: Vec<SemVer> = [
            "1.0.0-alpha",
            "1.0.0-alpha.1",
            "1.0.0-alpha.beta",
            "1.0.0-beta",
            "1.0.0-beta.2",
            "1.0.0-beta.11",
            "1.0.0-rc.1",
            "1.0.0",
            "1.0.1",
            "1.10.0",
            "2.0.0",
        ]
        .iter()
        .map(|s| SemVer::parse(s).unwrap())
        .collect();

        let mut shuffled = ordered.clone();
        shuffled.reverse();
        shuffled.sort();
        assert_eq!(shuffled, ordered);
    }
}
