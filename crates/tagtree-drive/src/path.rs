//! Drive path normalization.
//!
//! Paths are stored in canonical form: a leading `/`, components separated by
//! single slashes, no `.` or empty components, and no trailing slash.

use crate::error::{DriveError, DriveResult};

/// Canonicalize a file path. `a//b/./c` becomes `/a/b/c`.
pub fn normalize(path: &str) -> DriveResult<String> {
    let mut out = String::with_capacity(path.len() + 1);
    for component in path.split('/') {
        match component {
            "" | "." => continue,
            ".." => {
                return Err(DriveError::InvalidPath {
                    path: path.to_string(),
                    reason: "'..' is not allowed".into(),
                })
            }
            c if c.chars().any(char::is_control) => {
                return Err(DriveError::InvalidPath {
                    path: path.to_string(),
                    reason: "contains a control character".into(),
                })
            }
            c => {
                out.push('/');
                out.push_str(c);
            }
        }
    }

    if out.is_empty() {
        return Err(DriveError::InvalidPath {
            path: path.to_string(),
            reason: "names the root, not a file".into(),
        });
    }
    Ok(out)
}

/// Canonicalize a directory path. The root is `/`.
pub fn normalize_dir(path: &str) -> DriveResult<String> {
    match normalize(path) {
        Ok(p) => Ok(p),
        Err(DriveError::InvalidPath { .. }) if path.split('/').all(|c| c.is_empty() || c == ".") => {
            Ok("/".to_string())
        }
        Err(e) => Err(e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn canonical_forms() {
        assert_eq!(normalize("a/b").unwrap(), "/a/b");
        assert_eq!(normalize("/a//b/./c/").unwrap(), "/a/b/c");
        assert_eq!(normalize("/readme.md").unwrap(), "/readme.md");
    }

    #[test]
    fn rejects_root_and_parent() {
        assert!(normalize("/").is_err());
        assert!(normalize("").is_err());
        assert!(normalize("/a/../b").is_err());
        assert!(normalize("/a\nb").is_err());
    }

    #[test]
    fn directories_allow_root() {
        assert_eq!(normalize_dir("/").unwrap(), "/");
        assert_eq!(normalize_dir("").unwrap(), "/");
        assert_eq!(normalize_dir("docs/").unwrap(), "/docs");
        assert!(normalize_dir("../x").is_err());
    }
}
