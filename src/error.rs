//! Error types for store operations
//!
//! All errors that can surface from the store are defined here.
//! We use `thiserror` for ergonomic error definition and better error messages.
//!
//! Engine failures deliberately keep the underlying `git2::Error` as a
//! `source` only: the rendered message never echoes repository-internal
//! paths, so callers cannot learn the filesystem layout from a failure.

use std::path::PathBuf;

use thiserror::Error;

/// the main error type for store operations
#[derive(Debug, Error)]
pub enum StoreError {
    /// no storage root was configured, all operations are disabled
    #[error("git root was not configured")]
    NotConfigured,

    /// the configured storage root does not exist on disk
    #[error("configured git root '{0}' does not exist")]
    RootMissing(PathBuf),

    /// the capability set does not grant access to the requested repository
    #[error("missing or invalid repository capability for '{0}'")]
    Forbidden(String),

    /// a write was attempted while holding a read-only capability
    #[error("no right to modify repository '{0}'")]
    ReadOnly(String),

    /// the caller-supplied path failed the traversal checks
    #[error("invalid path '{0}'")]
    InvalidPath(String),

    /// a parameter had the wrong shape (empty path list, bad filter, ...)
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// the requested object does not exist
    #[error("not found: {0}")]
    NotFound(String),

    /// a store target resolved to an existing directory
    #[error("path '{0}' points to a directory")]
    PathIsDirectory(String),

    /// the resulting commit would be identical to the current tip
    #[error("commit would be empty")]
    EmptyCommit,

    /// error from the underlying git engine
    ///
    /// the cause is retained for logging but never rendered to the caller
    #[error("error opening git repository '{repo}'")]
    Engine {
        repo: String,
        #[source]
        source: git2::Error,
    },

    /// filesystem error while materializing the working tree
    #[error("error writing file content")]
    Io(#[source] std::io::Error),
}

impl StoreError {
    /// wrap a git engine error, tagging it with the repository name
    pub(crate) fn engine(repo: impl Into<String>, source: git2::Error) -> Self {
        StoreError::Engine {
            repo: repo.into(),
            source,
        }
    }

    /// check if this error is an authorization failure
    pub fn is_forbidden(&self) -> bool {
        matches!(self, StoreError::Forbidden(_) | StoreError::ReadOnly(_))
    }

    /// check if this error indicates the resource doesn't exist
    pub fn is_not_found(&self) -> bool {
        matches!(self, StoreError::NotFound(_))
    }

    /// check if this error was caused by caller input
    pub fn is_invalid_input(&self) -> bool {
        matches!(
            self,
            StoreError::InvalidPath(_)
                | StoreError::InvalidArgument(_)
                | StoreError::PathIsDirectory(_)
        )
    }
}

/// result type alias for store operations
pub type StoreResult<T> = Result<T, StoreError>;
