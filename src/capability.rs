//! Capability gate
//!
//! Authorization is derived from an opaque capability set attached to the
//! calling context by an external token verifier, never from OS identity.
//! The gate validates the set once per operation and produces an
//! [`OpContext`]: the resolved repository directory, the effective author
//! identity, and the subdirectory the caller is confined to.
//!
//! Commits are attributed to the caller as author but always to the fixed
//! system identity as committer, preserving an audit trail of which
//! process performed the write independent of claimed identity.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use crate::config::StoreConfig;
use crate::error::{StoreError, StoreResult};
use crate::path::SafePath;

/// capability keys as supplied by the host security context
pub const CAP_REPO: &str = "repo";
pub const CAP_NAME: &str = "name";
pub const CAP_EMAIL: &str = "email";
pub const CAP_SUBDIR: &str = "subdir";
pub const CAP_RO: &str = "ro";

/// fixed system identity used as committer and as the author fallback
const SYSTEM_NAME: &str = "gitvault";
const SYSTEM_EMAIL: &str = "gitvault@localhost";

/// A capability set for one invocation.
///
/// Typed once at the boundary instead of threading a string map through
/// every operation. `read_only` follows presence-only semantics: any value
/// under the `ro` key marks the capability read-only.
#[derive(Debug, Clone, Default)]
pub struct Capabilities {
    /// the repository this capability grants access to (exact match)
    pub repo: Option<String>,
    /// effective commit author name
    pub name: Option<String>,
    /// effective commit author email
    pub email: Option<String>,
    /// subdirectory the caller is confined to within the repository
    pub subdir: Option<String>,
    /// the capability only permits reads
    pub read_only: bool,
}

impl Capabilities {
    /// a capability granting full access to one repository
    pub fn for_repo(repo: impl Into<String>) -> Self {
        Self {
            repo: Some(repo.into()),
            ..Self::default()
        }
    }

    /// confine this capability to a subdirectory
    pub fn with_subdir(mut self, subdir: impl Into<String>) -> Self {
        self.subdir = Some(subdir.into());
        self
    }

    /// set the effective author identity
    pub fn with_identity(mut self, name: impl Into<String>, email: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self.email = Some(email.into());
        self
    }

    /// mark this capability read-only
    pub fn read_only(mut self) -> Self {
        self.read_only = true;
        self
    }

    /// Build a capability set from the raw key/value bag attached to the
    /// calling context. Unrecognized keys are ignored; `ro` is
    /// presence-only.
    pub fn from_map(map: &HashMap<String, String>) -> Self {
        Self {
            repo: map.get(CAP_REPO).cloned(),
            name: map.get(CAP_NAME).cloned(),
            email: map.get(CAP_EMAIL).cloned(),
            subdir: map.get(CAP_SUBDIR).cloned(),
            read_only: map.contains_key(CAP_RO),
        }
    }

    /// Decide whether an operation on `repo` may proceed.
    ///
    /// Checks, in order: the root is configured, the capability names
    /// exactly the requested repository, and a write is not attempted
    /// under a read-only capability. On success the returned context
    /// carries everything an operation needs.
    pub fn authorize(
        &self,
        config: &StoreConfig,
        repo: &str,
        write: bool,
    ) -> StoreResult<OpContext> {
        let root = config.require_root()?;

        match self.repo.as_deref() {
            Some(granted) if granted == repo => {}
            _ => return Err(StoreError::Forbidden(repo.to_string())),
        }

        if write && self.read_only {
            return Err(StoreError::ReadOnly(repo.to_string()));
        }

        // The repository name is joined to the root, so it must itself
        // survive the traversal checks (nested names are allowed).
        let repo_path = SafePath::sanitize(repo)?;

        let author = GitIdentity::new(
            self.name.as_deref().unwrap_or(SYSTEM_NAME),
            self.email.as_deref().unwrap_or(SYSTEM_EMAIL),
        );

        Ok(OpContext {
            repo: repo.to_string(),
            repo_dir: root.join(repo_path.as_rel_path()),
            author,
            subdir: self.subdir.clone(),
        })
    }
}

/// author or committer identity
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GitIdentity {
    pub name: String,
    pub email: String,
}

impl GitIdentity {
    pub fn new(name: impl Into<String>, email: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            email: email.into(),
        }
    }

    /// the fixed system identity
    pub fn system() -> Self {
        Self::new(SYSTEM_NAME, SYSTEM_EMAIL)
    }

    /// convert to a git2 signature stamped with the current time
    pub(crate) fn to_signature(&self) -> Result<git2::Signature<'static>, git2::Error> {
        git2::Signature::now(&self.name, &self.email)
    }
}

impl Default for GitIdentity {
    fn default() -> Self {
        Self::system()
    }
}

/// The effective context for one authorized operation.
#[derive(Debug, Clone)]
pub struct OpContext {
    repo: String,
    repo_dir: PathBuf,
    author: GitIdentity,
    subdir: Option<String>,
}

impl OpContext {
    pub fn repo(&self) -> &str {
        &self.repo
    }

    /// the on-disk repository directory (root/name)
    pub(crate) fn repo_dir(&self) -> &Path {
        &self.repo_dir
    }

    pub fn author(&self) -> &GitIdentity {
        &self.author
    }

    pub fn subdir(&self) -> Option<&str> {
        self.subdir.as_deref()
    }

    /// Apply the subdir prefix and sanitize in one step. The prefix is
    /// applied before sanitizing, so a hostile subdir value cannot widen
    /// the confinement either.
    pub(crate) fn safe_path(&self, path: &str) -> StoreResult<SafePath> {
        SafePath::sanitize(&self.prefixed(path))
    }

    /// the repository-relative form of a caller-supplied path
    pub(crate) fn prefixed(&self, path: &str) -> String {
        match &self.subdir {
            Some(subdir) => format!("{}/{}", subdir, path),
            None => path.to_string(),
        }
    }

    /// Strip the subdir prefix from a repository-relative path before it
    /// is returned to the caller. Paths outside the subdir are returned
    /// unchanged; enumeration filters keep those from occurring.
    pub(crate) fn strip(&self, path: &str) -> String {
        match &self.subdir {
            Some(subdir) => path
                .strip_prefix(subdir.as_str())
                .and_then(|rest| rest.strip_prefix('/'))
                .unwrap_or(path)
                .to_string(),
            None => path.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn config() -> (TempDir, StoreConfig) {
        let dir = TempDir::new().unwrap();
        let config = StoreConfig::new(dir.path()).unwrap();
        (dir, config)
    }

    #[test]
    fn test_not_configured_rejected_first() {
        let caps = Capabilities::for_repo("demo");
        let result = caps.authorize(&StoreConfig::disabled(), "demo", false);
        assert!(matches!(result, Err(StoreError::NotConfigured)));
    }

    #[test]
    fn test_repo_mismatch_forbidden() {
        let (_dir, config) = config();

        let caps = Capabilities::for_repo("demo");
        assert!(matches!(
            caps.authorize(&config, "other", false),
            Err(StoreError::Forbidden(r)) if r == "other"
        ));

        let no_repo = Capabilities::default();
        assert!(matches!(
            no_repo.authorize(&config, "demo", false),
            Err(StoreError::Forbidden(_))
        ));
    }

    #[test]
    fn test_read_only_blocks_writes_only() {
        let (_dir, config) = config();
        let caps = Capabilities::for_repo("demo").read_only();

        assert!(caps.authorize(&config, "demo", false).is_ok());
        assert!(matches!(
            caps.authorize(&config, "demo", true),
            Err(StoreError::ReadOnly(_))
        ));
    }

    #[test]
    fn test_identity_defaults() {
        let (_dir, config) = config();

        let ctx = Capabilities::for_repo("demo")
            .authorize(&config, "demo", true)
            .unwrap();
        assert_eq!(ctx.author(), &GitIdentity::system());

        let ctx = Capabilities::for_repo("demo")
            .with_identity("Alice", "alice@example.com")
            .authorize(&config, "demo", true)
            .unwrap();
        assert_eq!(ctx.author().name, "Alice");
        assert_eq!(ctx.author().email, "alice@example.com");
    }

    #[test]
    fn test_subdir_prefix_and_strip() {
        let (_dir, config) = config();
        let ctx = Capabilities::for_repo("demo")
            .with_subdir("team/a")
            .authorize(&config, "demo", false)
            .unwrap();

        assert_eq!(ctx.prefixed("file.txt"), "team/a/file.txt");
        assert_eq!(ctx.safe_path("file.txt").unwrap().as_str(), "team/a/file.txt");
        assert_eq!(ctx.strip("team/a/file.txt"), "file.txt");

        // traversal through the supplied path is still caught after prefixing
        assert!(matches!(
            ctx.safe_path("../escape"),
            Err(StoreError::InvalidPath(_))
        ));
    }

    #[test]
    fn test_repo_name_traversal_rejected() {
        let (_dir, config) = config();
        let caps = Capabilities::for_repo("../outside");
        assert!(matches!(
            caps.authorize(&config, "../outside", false),
            Err(StoreError::InvalidPath(_))
        ));
    }

    #[test]
    fn test_from_map() {
        let mut map = HashMap::new();
        map.insert("repo".to_string(), "demo".to_string());
        map.insert("name".to_string(), "Bob".to_string());
        map.insert("ro".to_string(), "".to_string());

        let caps = Capabilities::from_map(&map);
        assert_eq!(caps.repo.as_deref(), Some("demo"));
        assert_eq!(caps.name.as_deref(), Some("Bob"));
        assert!(caps.read_only);
        assert!(caps.subdir.is_none());
    }
}
