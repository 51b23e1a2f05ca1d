//! Mutating operations: store, remove, and the commit primitive
//!
//! All three follow the same discipline: authorize, sanitize, take the
//! repository writer lock, open a scoped repository handle, stage, commit.
//! The author of the resulting commit is the caller's effective identity;
//! the committer is always the fixed system identity.

use std::fs;

use git2::Repository;
use tracing::debug;

use crate::capability::{Capabilities, GitIdentity, OpContext};
use crate::error::{StoreError, StoreResult};
use crate::path::SafePath;

use super::{head_commit, open_repo, Content, GitStore, RemoveParams, StoreParams};

impl GitStore {
    /// Write `content` to a file in the repository and commit it.
    ///
    /// Parent directories are created as needed; a target that exists and
    /// is a directory is refused. If the resulting tree is identical to
    /// the current tip (content unchanged) no commit is created and
    /// `Ok(None)` is returned. With `no_workdir` set, the working-tree
    /// file is deleted after a successful commit since the content now
    /// lives in git history; deletion errors are ignored.
    ///
    /// Returns the new commit id as a hex string.
    pub fn store(&self, caps: &Capabilities, params: StoreParams) -> StoreResult<Option<String>> {
        let ctx = self.authorize(caps, &params.repo, true)?;
        let rel = ctx.safe_path(&params.path)?;
        debug!(repo = %ctx.repo(), path = %rel, "store");

        let lock = self.locks().handle(ctx.repo());
        let _guard = lock.lock();

        let repo = open_repo(&ctx)?;
        let rev = stage_and_commit(
            &repo,
            &ctx,
            &rel,
            params.content,
            &params.message,
            params.no_workdir,
        )?;
        Ok(rev)
    }

    /// Auxiliary commit primitive: positional arguments, otherwise the
    /// same semantics as [`GitStore::store`] without the `no_workdir`
    /// flag. The capability check is the same equality check as every
    /// other operation.
    pub fn commit(
        &self,
        caps: &Capabilities,
        repo: &str,
        path: &str,
        content: impl Into<Content>,
        message: &str,
    ) -> StoreResult<Option<String>> {
        self.store(caps, StoreParams::new(repo, path, content, message))
    }

    /// Remove one or more files and commit the removal.
    ///
    /// A path naming a directory removes everything tracked under it.
    /// Every path gets the subdir prefix applied and sanitized before any
    /// engine call. Removals that change nothing (no such paths tracked)
    /// fail with [`StoreError::EmptyCommit`].
    ///
    /// Returns the new commit id as a hex string.
    pub fn remove(&self, caps: &Capabilities, params: RemoveParams) -> StoreResult<String> {
        let ctx = self.authorize(caps, &params.repo, true)?;

        if params.paths.is_empty() {
            return Err(StoreError::InvalidArgument(
                "remove requires at least one path".to_string(),
            ));
        }

        let rels = params
            .paths
            .iter()
            .map(|p| ctx.safe_path(p))
            .collect::<StoreResult<Vec<_>>>()?;
        debug!(repo = %ctx.repo(), paths = rels.len(), "remove");

        let lock = self.locks().handle(ctx.repo());
        let _guard = lock.lock();

        let repo = open_repo(&ctx)?;
        let eng = |e: git2::Error| StoreError::engine(ctx.repo(), e);

        let mut index = repo.index().map_err(eng)?;
        for rel in &rels {
            // a path may name a file entry or a whole tracked subtree
            index.remove_path(rel.as_rel_path()).map_err(eng)?;
            index.remove_dir(rel.as_rel_path(), 0).map_err(eng)?;

            // the working-tree copy goes too, best effort
            let target = ctx.repo_dir().join(rel.as_rel_path());
            if target.is_dir() {
                let _ = fs::remove_dir_all(&target);
            } else {
                let _ = fs::remove_file(&target);
            }
        }
        index.write().map_err(eng)?;
        let tree_id = index.write_tree().map_err(eng)?;

        let parent = head_commit(&repo).map_err(eng)?;
        match &parent {
            Some(tip) if tip.tree_id() != tree_id => {}
            // nothing tracked changed, or the repository has no commits
            _ => return Err(StoreError::EmptyCommit),
        }

        let rev = commit_tree(&repo, &ctx, tree_id, parent, &params.message).map_err(eng)?;
        Ok(rev)
    }
}

/// Materialize, stage and commit a single file. Shared by store and the
/// commit primitive.
fn stage_and_commit(
    repo: &Repository,
    ctx: &OpContext,
    rel: &SafePath,
    content: Content,
    message: &str,
    no_workdir: bool,
) -> StoreResult<Option<String>> {
    let target = ctx.repo_dir().join(rel.as_rel_path());

    if target.is_dir() {
        return Err(StoreError::PathIsDirectory(rel.as_str().to_string()));
    }
    if let Some(parent) = target.parent() {
        fs::create_dir_all(parent).map_err(StoreError::Io)?;
    }
    fs::write(&target, content.into_bytes()).map_err(StoreError::Io)?;

    let eng = |e: git2::Error| StoreError::engine(ctx.repo(), e);

    let mut index = repo.index().map_err(eng)?;
    index.add_path(rel.as_rel_path()).map_err(eng)?;
    index.write().map_err(eng)?;
    let tree_id = index.write_tree().map_err(eng)?;

    let parent = head_commit(repo).map_err(eng)?;
    if let Some(tip) = &parent {
        if tip.tree_id() == tree_id {
            // content identical to the current tip: success, no new revision
            debug!(repo = %ctx.repo(), path = %rel, "empty commit");
            return Ok(None);
        }
    }

    let rev = commit_tree(repo, ctx, tree_id, parent, message).map_err(eng)?;

    if no_workdir {
        let _ = fs::remove_file(&target);
    }

    Ok(Some(rev))
}

/// Commit a written tree onto HEAD with the caller as author and the
/// system identity as committer.
fn commit_tree(
    repo: &Repository,
    ctx: &OpContext,
    tree_id: git2::Oid,
    parent: Option<git2::Commit<'_>>,
    message: &str,
) -> Result<String, git2::Error> {
    let tree = repo.find_tree(tree_id)?;
    let author = ctx.author().to_signature()?;
    let committer = GitIdentity::system().to_signature()?;

    let parents: Vec<&git2::Commit<'_>> = parent.iter().collect();
    let oid = repo.commit(Some("HEAD"), &author, &committer, message, &tree, &parents)?;
    Ok(oid.to_string())
}

#[cfg(test)]
mod tests {
    use super::super::testutil::{open_raw, store_with_repo};
    use super::*;

    #[test]
    fn test_store_creates_commit_and_dirs() {
        let (dir, store) = store_with_repo("demo");
        let caps = Capabilities::for_repo("demo");

        let rev = store
            .store(&caps, StoreParams::new("demo", "a/b.txt", "hello", "init"))
            .unwrap()
            .unwrap();
        assert_eq!(rev.len(), 40);
        assert!(rev.chars().all(|c| c.is_ascii_hexdigit()));

        // working-tree file exists, commit metadata is correct
        assert!(dir.path().join("demo/a/b.txt").is_file());

        let repo = open_raw(&dir, "demo");
        let commit = repo.head().unwrap().peel_to_commit().unwrap();
        assert_eq!(commit.id().to_string(), rev);
        assert_eq!(commit.message(), Some("init"));
        assert_eq!(commit.author().name(), Some("gitvault"));
        assert_eq!(commit.committer().name(), Some("gitvault"));
    }

    #[test]
    fn test_store_author_from_capability_committer_fixed() {
        let (dir, store) = store_with_repo("demo");
        let caps = Capabilities::for_repo("demo").with_identity("Alice", "alice@example.com");

        store
            .store(&caps, StoreParams::new("demo", "f.txt", "x", "msg"))
            .unwrap()
            .unwrap();

        let repo = open_raw(&dir, "demo");
        let commit = repo.head().unwrap().peel_to_commit().unwrap();
        assert_eq!(commit.author().name(), Some("Alice"));
        assert_eq!(commit.author().email(), Some("alice@example.com"));
        assert_eq!(commit.committer().name(), Some("gitvault"));
        assert_eq!(commit.committer().email(), Some("gitvault@localhost"));
    }

    #[test]
    fn test_store_identical_content_is_null_success() {
        let (_dir, store) = store_with_repo("demo");
        let caps = Capabilities::for_repo("demo");

        let first = store
            .store(&caps, StoreParams::new("demo", "f.txt", "same", "one"))
            .unwrap();
        assert!(first.is_some());

        let second = store
            .store(&caps, StoreParams::new("demo", "f.txt", "same", "two"))
            .unwrap();
        assert!(second.is_none());
    }

    #[test]
    fn test_store_no_workdir_deletes_file() {
        let (dir, store) = store_with_repo("demo");
        let caps = Capabilities::for_repo("demo");

        store
            .store(
                &caps,
                StoreParams::new("demo", "kept-in-history.txt", "data", "msg").no_workdir(),
            )
            .unwrap()
            .unwrap();

        assert!(!dir.path().join("demo/kept-in-history.txt").exists());
        // the content is still loadable from history
        let bytes = store.load(&caps, "demo", "kept-in-history.txt").unwrap();
        assert_eq!(bytes.as_deref(), Some(b"data".as_slice()));
    }

    #[test]
    fn test_store_directory_target_refused() {
        let (dir, store) = store_with_repo("demo");
        let caps = Capabilities::for_repo("demo");

        fs::create_dir_all(dir.path().join("demo/somedir")).unwrap();
        let result = store.store(&caps, StoreParams::new("demo", "somedir", "x", "msg"));
        assert!(matches!(result, Err(StoreError::PathIsDirectory(_))));
    }

    #[test]
    fn test_store_rejects_traversal_before_io() {
        let (dir, store) = store_with_repo("demo");
        let caps = Capabilities::for_repo("demo");

        let result = store.store(
            &caps,
            StoreParams::new("demo", "../outside.txt", "x", "msg"),
        );
        assert!(matches!(result, Err(StoreError::InvalidPath(_))));
        assert!(!dir.path().join("outside.txt").exists());
    }

    #[test]
    fn test_store_forbidden_without_matching_capability() {
        let (_dir, store) = store_with_repo("demo");

        let wrong = Capabilities::for_repo("other");
        let result = store.store(&wrong, StoreParams::new("demo", "f.txt", "x", "msg"));
        assert!(matches!(result, Err(StoreError::Forbidden(_))));

        let ro = Capabilities::for_repo("demo").read_only();
        let result = store.store(&ro, StoreParams::new("demo", "f.txt", "x", "msg"));
        assert!(matches!(result, Err(StoreError::ReadOnly(_))));
    }

    #[test]
    fn test_store_under_subdir() {
        let (dir, store) = store_with_repo("demo");
        let caps = Capabilities::for_repo("demo").with_subdir("team");

        store
            .store(&caps, StoreParams::new("demo", "doc.txt", "x", "msg"))
            .unwrap()
            .unwrap();
        assert!(dir.path().join("demo/team/doc.txt").is_file());
    }

    #[test]
    fn test_commit_primitive_round_trip() {
        let (_dir, store) = store_with_repo("demo");
        let caps = Capabilities::for_repo("demo");

        let rev = store
            .commit(&caps, "demo", "p.txt", "payload", "via primitive")
            .unwrap()
            .unwrap();
        assert_eq!(rev.len(), 40);

        let bytes = store.load(&caps, "demo", "p.txt").unwrap();
        assert_eq!(bytes.as_deref(), Some(b"payload".as_slice()));
    }

    #[test]
    fn test_remove_then_gone() {
        let (dir, store) = store_with_repo("demo");
        let caps = Capabilities::for_repo("demo");

        store
            .store(&caps, StoreParams::new("demo", "a/b.txt", "x", "add"))
            .unwrap()
            .unwrap();
        let rev = store
            .remove(&caps, RemoveParams::new("demo", "a/b.txt", "rm"))
            .unwrap();
        assert_eq!(rev.len(), 40);

        assert!(store.load(&caps, "demo", "a/b.txt").unwrap().is_none());
        assert!(!dir.path().join("demo/a/b.txt").exists());
    }

    #[test]
    fn test_remove_directory_removes_subtree() {
        let (dir, store) = store_with_repo("demo");
        let caps = Capabilities::for_repo("demo");

        store
            .store(&caps, StoreParams::new("demo", "a/b.txt", "1", "add b"))
            .unwrap();
        store
            .store(&caps, StoreParams::new("demo", "a/c.txt", "2", "add c"))
            .unwrap();
        store
            .store(&caps, StoreParams::new("demo", "keep.txt", "3", "add keep"))
            .unwrap();

        let rev = store
            .remove(&caps, RemoveParams::new("demo", "a", "rm subtree"))
            .unwrap();
        assert_eq!(rev.len(), 40);

        let entries = store.find(&caps, super::super::FindParams::new("demo")).unwrap();
        assert_eq!(entries, vec!["keep.txt"]);
        assert!(store.load(&caps, "demo", "a/b.txt").unwrap().is_none());
        assert!(!dir.path().join("demo/a").exists());
    }

    #[test]
    fn test_remove_multiple_paths_single_commit() {
        let (_dir, store) = store_with_repo("demo");
        let caps = Capabilities::for_repo("demo");

        store
            .store(&caps, StoreParams::new("demo", "one.txt", "1", "a"))
            .unwrap();
        store
            .store(&caps, StoreParams::new("demo", "two.txt", "2", "b"))
            .unwrap();

        store
            .remove(
                &caps,
                RemoveParams::many(
                    "demo",
                    vec!["one.txt".to_string(), "two.txt".to_string()],
                    "rm both",
                ),
            )
            .unwrap();

        assert!(store.find(&caps, super::super::FindParams::new("demo")).unwrap().is_empty());
    }

    #[test]
    fn test_remove_noop_is_empty_commit() {
        let (_dir, store) = store_with_repo("demo");
        let caps = Capabilities::for_repo("demo");

        store
            .store(&caps, StoreParams::new("demo", "f.txt", "x", "add"))
            .unwrap();
        let result = store.remove(&caps, RemoveParams::new("demo", "untracked.txt", "rm"));
        assert!(matches!(result, Err(StoreError::EmptyCommit)));
    }

    #[test]
    fn test_remove_empty_list_rejected() {
        let (_dir, store) = store_with_repo("demo");
        let caps = Capabilities::for_repo("demo");

        let result = store.remove(&caps, RemoveParams::many("demo", vec![], "rm"));
        assert!(matches!(result, Err(StoreError::InvalidArgument(_))));
    }
}
