//! Read operations: load and find
//!
//! Both operate on the tree of the current HEAD commit, an immutable
//! object once created, so no repository lock is taken. Branch and tag
//! selection is fixed to HEAD; this is a known limitation carried over
//! from the operation protocol.

use git2::{ErrorCode, ObjectType, TreeWalkMode, TreeWalkResult};
use regex::Regex;
use tracing::debug;

use crate::capability::Capabilities;
use crate::error::{StoreError, StoreResult};

use super::{head_commit, open_repo, FindParams, GitStore};

impl GitStore {
    /// Load the committed content of a file.
    ///
    /// Resolves HEAD, looks the (subdir-prefixed, sanitized) path up in
    /// its tree and returns the blob's raw bytes. A missing path, an
    /// empty repository, or a path that names a directory all yield
    /// `Ok(None)` rather than failing.
    pub fn load(&self, caps: &Capabilities, repo: &str, path: &str) -> StoreResult<Option<Vec<u8>>> {
        let ctx = self.authorize(caps, repo, false)?;
        let rel = ctx.safe_path(path)?;
        debug!(repo = %ctx.repo(), path = %rel, "load");

        let repo = open_repo(&ctx)?;
        let eng = |e: git2::Error| StoreError::engine(ctx.repo(), e);

        let tip = match head_commit(&repo).map_err(eng)? {
            Some(tip) => tip,
            None => return Ok(None),
        };
        let tree = tip.tree().map_err(eng)?;

        let entry = match tree.get_path(rel.as_rel_path()) {
            Ok(entry) => entry,
            Err(e) if e.code() == ErrorCode::NotFound => return Ok(None),
            Err(e) => return Err(eng(e)),
        };

        if entry.kind() != Some(ObjectType::Blob) {
            return Ok(None);
        }

        let object = entry.to_object(&repo).map_err(eng)?;
        let blob = object.peel_to_blob().map_err(eng)?;
        Ok(Some(blob.content().to_vec()))
    }

    /// Enumerate files reachable from HEAD, optionally filtered by a
    /// regular expression over the full relative path.
    ///
    /// The filter must match the whole path. Under a subdir-confined
    /// capability the pattern is prefixed with the quoted subdir (keeping
    /// a caller-supplied `^` anchor in front), so matches never leave the
    /// confinement, and the prefix is stripped from every returned path.
    /// Directories are descended into but never emitted.
    pub fn find(&self, caps: &Capabilities, params: FindParams) -> StoreResult<Vec<String>> {
        let ctx = self.authorize(caps, &params.repo, false)?;

        let pattern = effective_filter(params.filter.as_deref(), ctx.subdir());
        let matcher = match &pattern {
            // full-string match semantics
            Some(p) => Some(
                Regex::new(&format!("^(?:{})$", p))
                    .map_err(|e| StoreError::InvalidArgument(format!("invalid filter: {}", e)))?,
            ),
            None => None,
        };
        debug!(repo = %ctx.repo(), filter = ?pattern, "find");

        let repo = open_repo(&ctx)?;
        let eng = |e: git2::Error| StoreError::engine(ctx.repo(), e);

        let tip = match head_commit(&repo).map_err(eng)? {
            Some(tip) => tip,
            None => return Ok(Vec::new()),
        };
        let tree = tip.tree().map_err(eng)?;

        let mut entries = Vec::new();
        tree.walk(TreeWalkMode::PreOrder, |dir, entry| {
            if entry.kind() == Some(ObjectType::Blob) {
                if let Some(name) = entry.name() {
                    let path = format!("{}{}", dir, name);
                    let matched = match &matcher {
                        Some(regex) => regex.is_match(&path),
                        None => true,
                    };
                    if matched {
                        entries.push(ctx.strip(&path));
                    }
                }
            }
            TreeWalkResult::Ok
        })
        .map_err(eng)?;

        Ok(entries)
    }
}

/// Combine the caller's filter with the capability's subdir confinement.
///
/// No filter and no subdir means "everything" (no regex at all). With a
/// subdir, an absent filter becomes `{subdir}/.*`; a present filter is
/// prefixed with the quoted subdir, hoisting a leading `^` anchor so it
/// still anchors the combined pattern.
fn effective_filter(filter: Option<&str>, subdir: Option<&str>) -> Option<String> {
    match (filter, subdir) {
        (None, None) => None,
        (Some(f), None) => Some(f.to_string()),
        (None, Some(s)) => Some(format!("{}/.*", regex::escape(s))),
        (Some(f), Some(s)) => {
            if let Some(rest) = f.strip_prefix('^') {
                Some(format!("^{}/{}", regex::escape(s), rest))
            } else {
                Some(format!("{}/{}", regex::escape(s), f))
            }
        }
    }
}
