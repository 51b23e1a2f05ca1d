//! Path sanitization
//!
//! Caller-supplied paths are validated before they are ever joined to a
//! repository directory. The check is purely syntactic: no symlink
//! resolution, no canonicalization. The guarantee is that no
//! request-controlled string can walk above the directory it is joined to
//! by means of textual traversal segments.

use std::path::Path;

use crate::error::{StoreError, StoreResult};

/// A relative, slash-separated path that passed the traversal checks.
///
/// Construction via [`SafePath::sanitize`] is the only way to obtain one,
/// so holding a `SafePath` is proof the checks ran.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SafePath(String);

impl SafePath {
    /// Validate a caller-supplied relative path.
    ///
    /// Rejected: empty paths, absolute paths, and any path with a `.`,
    /// `..` or empty component. This covers the classic textual attacks
    /// (`/../`, `/./`, leading `./`, `../`, `/`) as well as the bare `..`
    /// and trailing `/..` forms a substring check alone would miss.
    pub fn sanitize(path: &str) -> StoreResult<Self> {
        if path.is_empty() || path.starts_with('/') {
            return Err(StoreError::InvalidPath(path.to_string()));
        }

        for component in path.split('/') {
            if component.is_empty() || component == "." || component == ".." {
                return Err(StoreError::InvalidPath(path.to_string()));
            }
        }

        Ok(Self(path.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// the path as a `Path` for joining and index operations
    pub fn as_rel_path(&self) -> &Path {
        Path::new(&self.0)
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl std::fmt::Display for SafePath {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl AsRef<str> for SafePath {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_paths() {
        assert!(SafePath::sanitize("a.txt").is_ok());
        assert!(SafePath::sanitize("a/b.txt").is_ok());
        assert!(SafePath::sanitize("deeply/nested/dir/file").is_ok());
        assert!(SafePath::sanitize(".hidden").is_ok());
        assert!(SafePath::sanitize("a/.hidden").is_ok());
        assert!(SafePath::sanitize("..double").is_ok());
    }

    #[test]
    fn test_traversal_rejected() {
        for bad in [
            "",
            "/etc/passwd",
            "/a",
            "./a",
            "../a",
            "a/../b",
            "a/./b",
            "a/..",
            "a/.",
            "..",
            ".",
            "a//b",
            "a/",
        ] {
            let result = SafePath::sanitize(bad);
            assert!(
                matches!(result, Err(StoreError::InvalidPath(_))),
                "expected rejection for {:?}",
                bad
            );
        }
    }
}
