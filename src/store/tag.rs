//! Annotated tagging
//!
//! Tags are always annotated, with the caller's effective identity as
//! tagger. Under a subdir-confined capability the tag does not point at
//! the literally requested revision but at the nearest ancestor commit
//! (inclusive) that last modified the subdirectory, so a confined caller
//! can only mark states of its own subtree.

use git2::ErrorCode;
use tracing::debug;

use crate::capability::Capabilities;
use crate::error::{StoreError, StoreResult};
use crate::path::SafePath;

use super::history::first_touching;
use super::{open_repo, GitStore, TagParams};

impl GitStore {
    /// Create (or with `force`, re-point) an annotated tag.
    ///
    /// `rev` defaults to HEAD and accepts anything the engine's revision
    /// parser does. Returns the new tag object's id as a hex string.
    pub fn tag(&self, caps: &Capabilities, params: TagParams) -> StoreResult<String> {
        let ctx = self.authorize(caps, &params.repo, true)?;
        let rev = params.rev.as_deref().unwrap_or("HEAD");
        debug!(repo = %ctx.repo(), tag = %params.name, rev, "tag");

        let lock = self.locks().handle(ctx.repo());
        let _guard = lock.lock();

        let repo = open_repo(&ctx)?;
        let eng = |e: git2::Error| StoreError::engine(ctx.repo(), e);

        let requested = match repo.revparse_single(rev) {
            Ok(object) => object.peel_to_commit().map_err(eng)?,
            Err(e) if e.code() == ErrorCode::NotFound => {
                return Err(StoreError::NotFound(format!("invalid revision '{}'", rev)))
            }
            Err(e) => return Err(eng(e)),
        };

        let target = match ctx.subdir() {
            Some(subdir) => {
                let subdir = SafePath::sanitize(subdir)?;
                first_touching(&repo, requested.id(), &subdir)
                    .map_err(eng)?
                    .ok_or_else(|| {
                        StoreError::NotFound(format!("invalid revision '{}'", rev))
                    })?
            }
            None => requested,
        };

        let tagger = ctx.author().to_signature().map_err(eng)?;
        let oid = repo
            .tag(
                &params.name,
                target.as_object(),
                &tagger,
                &params.message,
                params.force,
            )
            .map_err(|e| {
                if e.code() == ErrorCode::Exists {
                    StoreError::InvalidArgument(format!("tag '{}' already exists", params.name))
                } else {
                    eng(e)
                }
            })?;

        Ok(oid.to_string())
    }
}
