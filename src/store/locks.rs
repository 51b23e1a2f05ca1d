//! Per-repository writer locks
//!
//! The underlying git index and ref storage are not safe for uncoordinated
//! concurrent writers, and the write sequence {materialize working tree →
//! stage → commit} spans several engine calls. Every mutating operation
//! takes the lock for its repository before touching the engine, making
//! store/remove/tag atomic with respect to each other within the process.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;

/// named locks keyed by repository name
pub(crate) struct LockRegistry {
    locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl LockRegistry {
    pub fn new() -> Self {
        Self {
            locks: Mutex::new(HashMap::new()),
        }
    }

    /// The lock handle for a repository, created on first use.
    ///
    /// Callers clone the `Arc` out and hold the guard for the whole write:
    ///
    /// ```ignore
    /// let lock = store.locks().handle(ctx.repo());
    /// let _guard = lock.lock();
    /// ```
    pub fn handle(&self, repo: &str) -> Arc<Mutex<()>> {
        let mut locks = self.locks.lock();
        locks
            .entry(repo.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }
}
