use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::TypeError;

/// A drive version number.
///
/// Versions are the length of the drive's metadata log, so they only ever
/// grow. A version is stored in the tag index as its decimal text form.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Version(u64);

impl Version {
    /// The version of an empty log.
    pub const ZERO: Self = Self(0);

    pub const fn new(n: u64) -> Self {
        Self(n)
    }

    pub const fn get(self) -> u64 {
        self.0
    }

    /// Decimal text encoding, as written to the tag index.
    pub fn to_text(self) -> String {
        self.0.to_string()
    }

    /// Parse the decimal text encoding. Signs, whitespace, and empty input
    /// are rejected.
    pub fn from_text(s: &str) -> Result<Self, TypeError> {
        if s.is_empty() || !s.bytes().all(|b| b.is_ascii_digit()) {
            return Err(TypeError::InvalidVersion(s.to_string()));
        }
        s.parse::<u64>()
            .map(Self)
            .map_err(|_| TypeError::InvalidVersion(s.to_string()))
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for Version {
    type Err = TypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_text(s)
    }
}

impl From<u64> for Version {
    fn from(n: u64) -> Self {
        Self(n)
    }
}

impl From<Version> for u64 {
    fn from(v: Version) -> Self {
        v.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn text_encoding_is_decimal() {
        assert_eq!(Version::new(42).to_text(), "42");
        assert_eq!(Version::from_text("42").unwrap(), Version::new(42));
    }

    #[test]
    fn rejects_non_decimal_text() {
        for bad in ["", "-1", "+1", " 1", "1.0", "0x10", "abc"] {
            assert!(Version::from_text(bad).is_err(), "accepted {bad:?}");
        }
    }

    #[test]
    fn rejects_overflow() {
        assert!(Version::from_text("18446744073709551616").is_err());
    }

    proptest! {
        #[test]
        fn text_roundtrip(n in any::<u64>()) {
            let v = Version::new(n);
            prop_assert_eq!(Version::from_text(&v.to_text()).unwrap(), v);
        }
    }
}
