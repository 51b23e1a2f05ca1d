//! Storage root configuration
//!
//! A single directory is configured once at process start; every permitted
//! repository must live directly under it. An unconfigured root disables
//! all operations rather than defaulting to a path.
//!
//! The config is an explicit value passed into [`GitStore`](crate::GitStore),
//! never global state, so several roots can coexist in one process (tests
//! rely on this).

use std::path::{Path, PathBuf};

use crate::error::{StoreError, StoreResult};

/// environment variable consulted by [`StoreConfig::from_env`]
pub const ROOT_ENV: &str = "GITVAULT_ROOT";

/// the storage root registry
///
/// Immutable after construction. `root` is `None` when the setting was
/// absent, in which case every operation fails with
/// [`StoreError::NotConfigured`].
#[derive(Debug, Clone)]
pub struct StoreConfig {
    root: Option<PathBuf>,
}

impl StoreConfig {
    /// Configure a storage root.
    ///
    /// The directory must already exist, matching the startup check of the
    /// host configuration: a dangling root is a deployment error, not
    /// something to silently create.
    pub fn new(root: impl Into<PathBuf>) -> StoreResult<Self> {
        let root = root.into();
        if !root.is_dir() {
            return Err(StoreError::RootMissing(root));
        }
        Ok(Self { root: Some(root) })
    }

    /// A config with no root: every operation is rejected.
    pub fn disabled() -> Self {
        Self { root: None }
    }

    /// Read the root from [`ROOT_ENV`], treating an absent variable as
    /// "disabled" rather than an error.
    pub fn from_env() -> StoreResult<Self> {
        match std::env::var(ROOT_ENV) {
            Ok(value) if !value.is_empty() => Self::new(value),
            _ => Ok(Self::disabled()),
        }
    }

    /// the configured root, if any
    pub fn root(&self) -> Option<&Path> {
        self.root.as_deref()
    }

    pub fn is_configured(&self) -> bool {
        self.root.is_some()
    }

    /// the configured root, or `NotConfigured`
    pub(crate) fn require_root(&self) -> StoreResult<&Path> {
        self.root.as_deref().ok_or(StoreError::NotConfigured)
    }
}
