//! Git operation façade
//!
//! The six externally exposed operations (store, load, remove, find, log,
//! tag) plus the auxiliary commit primitive. Every operation follows the
//! same shape:
//!
//! ```text
//! caller → capability gate (reject early)
//!        → path sanitizer  (reject early)
//!        → git engine I/O  (scoped repository handle)
//!        → result or typed failure
//! ```
//!
//! Each call opens its own `git2::Repository` and drops it on every exit
//! path; no handle outlives the call. Writers additionally serialize on a
//! per-repository lock (see [`locks`]), so at most one writer mutates a
//! given repository's working tree and index at any instant. Reads operate
//! on already-committed tree objects and need no lock.

mod history;
mod locks;
mod read;
mod tag;
mod write;

pub use history::{CommitRecord, Identity};

use git2::{ErrorCode, Repository};

use crate::capability::{Capabilities, OpContext};
use crate::config::StoreConfig;
use crate::error::{StoreError, StoreResult};
use locks::LockRegistry;

/// File content accepted from the caller.
///
/// Text or raw bytes, normalized to bytes at the boundary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Content {
    Text(String),
    Bytes(Vec<u8>),
}

impl Content {
    pub fn into_bytes(self) -> Vec<u8> {
        match self {
            Content::Text(text) => text.into_bytes(),
            Content::Bytes(bytes) => bytes,
        }
    }

    pub fn len(&self) -> usize {
        match self {
            Content::Text(text) => text.len(),
            Content::Bytes(bytes) => bytes.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl From<&str> for Content {
    fn from(text: &str) -> Self {
        Content::Text(text.to_string())
    }
}

impl From<String> for Content {
    fn from(text: String) -> Self {
        Content::Text(text)
    }
}

impl From<Vec<u8>> for Content {
    fn from(bytes: Vec<u8>) -> Self {
        Content::Bytes(bytes)
    }
}

impl From<&[u8]> for Content {
    fn from(bytes: &[u8]) -> Self {
        Content::Bytes(bytes.to_vec())
    }
}

/// parameters for [`GitStore::store`]
#[derive(Debug, Clone)]
pub struct StoreParams {
    pub repo: String,
    pub path: String,
    pub content: Content,
    pub message: String,
    /// delete the working-tree file after a successful commit; the content
    /// then lives only in git history
    pub no_workdir: bool,
}

impl StoreParams {
    pub fn new(
        repo: impl Into<String>,
        path: impl Into<String>,
        content: impl Into<Content>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            repo: repo.into(),
            path: path.into(),
            content: content.into(),
            message: message.into(),
            no_workdir: false,
        }
    }

    pub fn no_workdir(mut self) -> Self {
        self.no_workdir = true;
        self
    }
}

/// parameters for [`GitStore::remove`]
#[derive(Debug, Clone)]
pub struct RemoveParams {
    pub repo: String,
    pub paths: Vec<String>,
    pub message: String,
}

impl RemoveParams {
    pub fn new(
        repo: impl Into<String>,
        path: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            repo: repo.into(),
            paths: vec![path.into()],
            message: message.into(),
        }
    }

    pub fn many(
        repo: impl Into<String>,
        paths: Vec<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            repo: repo.into(),
            paths,
            message: message.into(),
        }
    }
}

/// parameters for [`GitStore::find`]
#[derive(Debug, Clone)]
pub struct FindParams {
    pub repo: String,
    /// regular expression matched against the full relative path; `None`
    /// returns every file
    pub filter: Option<String>,
}

impl FindParams {
    pub fn new(repo: impl Into<String>) -> Self {
        Self {
            repo: repo.into(),
            filter: None,
        }
    }

    pub fn filter(mut self, pattern: impl Into<String>) -> Self {
        self.filter = Some(pattern.into());
        self
    }
}

/// parameters for [`GitStore::log`]
#[derive(Debug, Clone)]
pub struct LogParams {
    pub repo: String,
    /// restrict history to commits that touched any of these paths
    pub paths: Vec<String>,
    /// window size; negative values clamp to zero (no results)
    pub count: Option<i64>,
    /// commits to skip before the window; negative means no skip
    pub skip: Option<i64>,
}

impl LogParams {
    pub fn new(repo: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            repo: repo.into(),
            paths: vec![path.into()],
            count: None,
            skip: None,
        }
    }

    pub fn many(repo: impl Into<String>, paths: Vec<String>) -> Self {
        Self {
            repo: repo.into(),
            paths,
            count: None,
            skip: None,
        }
    }

    pub fn count(mut self, count: i64) -> Self {
        self.count = Some(count);
        self
    }

    pub fn skip(mut self, skip: i64) -> Self {
        self.skip = Some(skip);
        self
    }
}

/// parameters for [`GitStore::tag`]
#[derive(Debug, Clone)]
pub struct TagParams {
    pub repo: String,
    pub name: String,
    pub message: String,
    /// revision to tag; defaults to HEAD
    pub rev: Option<String>,
    /// allow re-pointing an existing tag
    pub force: bool,
}

impl TagParams {
    pub fn new(
        repo: impl Into<String>,
        name: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            repo: repo.into(),
            name: name.into(),
            message: message.into(),
            rev: None,
            force: false,
        }
    }

    pub fn rev(mut self, rev: impl Into<String>) -> Self {
        self.rev = Some(rev.into());
        self
    }

    pub fn force(mut self) -> Self {
        self.force = true;
        self
    }
}

/// The capability-scoped document store.
///
/// Holds the root configuration and the per-repository writer locks.
/// Cheap to share by reference; operations are synchronous and keep no
/// state between calls.
pub struct GitStore {
    config: StoreConfig,
    locks: LockRegistry,
}

impl GitStore {
    pub fn new(config: StoreConfig) -> Self {
        Self {
            config,
            locks: LockRegistry::new(),
        }
    }

    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    /// run the capability gate for one operation
    pub(crate) fn authorize(
        &self,
        caps: &Capabilities,
        repo: &str,
        write: bool,
    ) -> StoreResult<OpContext> {
        caps.authorize(&self.config, repo, write)
    }

    pub(crate) fn locks(&self) -> &LockRegistry {
        &self.locks
    }
}

/// Open the repository an authorized context points at.
///
/// Engine errors are wrapped so the rendered message names only the
/// repository, never the on-disk path.
pub(crate) fn open_repo(ctx: &OpContext) -> StoreResult<Repository> {
    Repository::open(ctx.repo_dir()).map_err(|e| {
        tracing::warn!(repo = %ctx.repo(), error = %e, "failed to open repository");
        StoreError::engine(ctx.repo(), e)
    })
}

/// Resolve the current HEAD commit, treating an unborn branch (fresh
/// repository with no commits yet) as "no tip" rather than an error.
pub(crate) fn head_commit(repo: &Repository) -> Result<Option<git2::Commit<'_>>, git2::Error> {
    match repo.head() {
        Ok(head) => Ok(Some(head.peel_to_commit()?)),
        Err(e) if e.code() == ErrorCode::UnbornBranch || e.code() == ErrorCode::NotFound => {
            Ok(None)
        }
        Err(e) => Err(e),
    }
}

#[cfg(test)]
pub(crate) mod testutil {
    use super::*;
    use tempfile::TempDir;

    /// a store over a fresh root with one initialized repository
    pub fn store_with_repo(name: &str) -> (TempDir, GitStore) {
        let dir = TempDir::new().unwrap();
        Repository::init(dir.path().join(name)).unwrap();
        let store = GitStore::new(StoreConfig::new(dir.path()).unwrap());
        (dir, store)
    }

    pub fn open_raw(dir: &TempDir, name: &str) -> Repository {
        Repository::open(dir.path().join(name)).unwrap()
    }
}
