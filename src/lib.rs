//! gitvault - a capability-scoped document store backed by Git
//!
//! Callers read, write, delete, enumerate and tag files inside a confined
//! set of local Git repositories. Every operation is authorized by an
//! opaque capability set attached to the call, not by OS identity, and
//! every caller-supplied path is sanitized before it is joined to a
//! repository directory.
//!
//! # Example
//!
//! ```no_run
//! use gitvault::{Capabilities, GitStore, StoreConfig, StoreParams};
//!
//! let store = GitStore::new(StoreConfig::new("/srv/repos").unwrap());
//! let caps = Capabilities::for_repo("demo");
//!
//! let rev = store
//!     .store(&caps, StoreParams::new("demo", "a/b.txt", "hello", "init"))
//!     .unwrap();
//! let bytes = store.load(&caps, "demo", "a/b.txt").unwrap();
//! ```
//!
//! The git object model is an external collaborator reached through
//! `git2`; this crate owns authorization, path confinement, and the
//! mapping of the operation protocol onto commits, trees and tags.

pub mod capability;
pub mod config;
pub mod error;
pub mod path;
pub mod store;

pub use capability::{Capabilities, GitIdentity, OpContext};
pub use config::{StoreConfig, ROOT_ENV};
pub use error::{StoreError, StoreResult};
pub use path::SafePath;
pub use store::{
    CommitRecord, Content, FindParams, GitStore, Identity, LogParams, RemoveParams, StoreParams,
    TagParams,
};
