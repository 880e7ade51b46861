//! Tag name validation.
//!
//! Tag names are arbitrary text with three restrictions:
//! - Must be non-empty
//! - Must be at most [`MAX_KEY_LEN`] bytes of UTF-8
//! - Must not contain control characters

use crate::error::{IndexError, IndexResult};

/// Upper bound on the encoded length of a key.
pub const MAX_KEY_LEN: usize = 1024;

/// Validate a tag name, returning `Ok(())` if valid.
///
/// # Examples
///
/// ```
/// use tagtree_index::names::validate_key;
///
/// assert!(validate_key("v1.0.0").is_ok());
/// assert!(validate_key("release candidate/2").is_ok());
/// assert!(validate_key("").is_err());
/// assert!(validate_key("bad\nname").is_err());
/// ```
pub fn validate_key(key: &str) -> IndexResult<()> {
    if key.is_empty() {
        return Err(IndexError::InvalidKey {
            key: key.to_string(),
            reason: "must not be empty".into(),
        });
    }

    if key.len() > MAX_KEY_LEN {
        return Err(IndexError::InvalidKey {
            key: key.chars().take(32).collect(),
            reason: format!("longer than {MAX_KEY_LEN} bytes"),
        });
    }

    if let Some(ch) = key.chars().find(|c| c.is_control()) {
        return Err(IndexError::InvalidKey {
            key: key.to_string(),
            reason: format!("contains control character {ch:?}"),
        });
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_free_form_text() {
        assert!(validate_key("latest").is_ok());
        assert!(validate_key("v2.1.0-rc.1").is_ok());
        assert!(validate_key("with spaces and ünïcode").is_ok());
        assert!(validate_key("a/b/../c").is_ok());
    }

    #[test]
    fn rejects_empty() {
        assert!(validate_key("").is_err());
    }

    #[test]
    fn rejects_control_characters() {
        assert!(validate_key("tab\there").is_err());
        assert!(validate_key("nul\0").is_err());
        assert!(validate_key("esc\u{1b}").is_err());
    }

    #[test]
    fn length_limit_is_in_bytes() {
        assert!(validate_key(&"a".repeat(MAX_KEY_LEN)).is_ok());
        assert!(validate_key(&"a".repeat(MAX_KEY_LEN + 1)).is_err());
        // 512 two-byte characters fit exactly.
        assert!(validate_key(&"é".repeat(512)).is_ok());
        assert!(validate_key(&"é".repeat(513)).is_err());
    }
}
