//! Path-restricted history and tag enrichment
//!
//! `log` walks commits most-recent-first, keeps those whose tree differs
//! from their first parent's at any of the requested paths, applies the
//! skip/count window, then merges in the repository's tags:
//!
//! - an annotated tag whose target commit is in the result set becomes a
//!   record of its own (keyed by the tag object id) and its name is
//!   appended to the target commit's `tags` list;
//! - a lightweight tag inserts its commit only if not already present.
//!
//! The merge is keyed by revision id with insertion-order emission, so
//! path-restricted commits come first, tag-derived entries after, in
//! tag-enumeration order.

use std::collections::HashMap;

use chrono::{DateTime, TimeZone, Utc};
use git2::{Commit, DiffOptions, Repository, Sort};
use serde::Serialize;
use tracing::debug;

use crate::capability::Capabilities;
use crate::error::{StoreError, StoreResult};
use crate::path::SafePath;

use super::{head_commit, open_repo, GitStore, LogParams};

/// author, committer or tagger identity on an output record
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Identity {
    pub name: String,
    pub email: String,
    pub timestamp: DateTime<Utc>,
}

impl Identity {
    fn from_signature(sig: &git2::Signature<'_>) -> Self {
        let timestamp = Utc
            .timestamp_opt(sig.when().seconds(), 0)
            .single()
            .unwrap_or_else(Utc::now);

        Self {
            name: sig.name().unwrap_or("Unknown").to_string(),
            email: sig.email().unwrap_or("unknown@unknown").to_string(),
            timestamp,
        }
    }

    fn unknown() -> Self {
        Self {
            name: "Unknown".to_string(),
            email: "unknown@unknown".to_string(),
            timestamp: Utc::now(),
        }
    }
}

/// One entry in a `log` result: a commit, or an annotated tag object.
///
/// Constructed transiently per call from the engine's objects; never
/// persisted.
#[derive(Debug, Clone, Serialize)]
pub struct CommitRecord {
    /// revision id (commit id, or the tag object's own id)
    pub rev: String,
    /// full commit or tag message
    pub message: String,
    /// `"commit"` or `"tag"`
    #[serde(rename = "type")]
    pub object_type: String,
    /// commit author, or tagger for tag records
    pub author: Identity,
    /// absent on tag records
    #[serde(skip_serializing_if = "Option::is_none")]
    pub committer: Option<Identity>,
    /// tag name, on tag records only
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tag: Option<String>,
    /// id of the tagged object, on tag records only
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tagged: Option<String>,
    /// names of annotated tags pointing at this commit
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tags: Option<Vec<String>>,
}

impl CommitRecord {
    fn from_commit(commit: &Commit<'_>) -> Self {
        Self {
            rev: commit.id().to_string(),
            message: commit.message().unwrap_or("").to_string(),
            object_type: "commit".to_string(),
            author: Identity::from_signature(&commit.author()),
            committer: Some(Identity::from_signature(&commit.committer())),
            tag: None,
            tagged: None,
            tags: None,
        }
    }

    fn from_tag(tag: &git2::Tag<'_>) -> Self {
        Self {
            rev: tag.id().to_string(),
            message: tag.message().unwrap_or("").to_string(),
            object_type: "tag".to_string(),
            author: tag
                .tagger()
                .map(|sig| Identity::from_signature(&sig))
                .unwrap_or_else(Identity::unknown),
            committer: None,
            tag: Some(tag.name().unwrap_or("").to_string()),
            tagged: Some(tag.target_id().to_string()),
            tags: None,
        }
    }
}

/// Records keyed by revision id, emitted in insertion order.
struct RecordSet {
    records: Vec<CommitRecord>,
    index: HashMap<String, usize>,
}

impl RecordSet {
    fn new() -> Self {
        Self {
            records: Vec::new(),
            index: HashMap::new(),
        }
    }

    fn insert(&mut self, record: CommitRecord) {
        match self.index.get(&record.rev) {
            Some(&i) => self.records[i] = record,
            None => {
                self.index.insert(record.rev.clone(), self.records.len());
                self.records.push(record);
            }
        }
    }

    fn insert_if_absent(&mut self, record: CommitRecord) {
        if !self.index.contains_key(&record.rev) {
            self.insert(record);
        }
    }

    fn contains(&self, rev: &str) -> bool {
        self.index.contains_key(rev)
    }

    fn get_mut(&mut self, rev: &str) -> Option<&mut CommitRecord> {
        let i = *self.index.get(rev)?;
        self.records.get_mut(i)
    }

    fn into_vec(self) -> Vec<CommitRecord> {
        self.records
    }
}

impl GitStore {
    /// History of the commits that touched any of the given paths, with
    /// tag enrichment.
    ///
    /// Most recent first. `count` limits the window (negative clamps to
    /// zero, meaning no commits); `skip` drops that many qualifying
    /// commits first (negative means no skip). Tags are merged into the
    /// result afterwards regardless of the window.
    pub fn log(&self, caps: &Capabilities, params: LogParams) -> StoreResult<Vec<CommitRecord>> {
        let ctx = self.authorize(caps, &params.repo, false)?;

        if params.paths.is_empty() {
            return Err(StoreError::InvalidArgument(
                "log requires at least one path".to_string(),
            ));
        }

        let rels = params
            .paths
            .iter()
            .map(|p| ctx.safe_path(p))
            .collect::<StoreResult<Vec<_>>>()?;

        let count = params.count.map(|c| c.max(0) as usize);
        let skip = match params.skip {
            Some(s) if s >= 0 => s as usize,
            _ => 0,
        };
        debug!(repo = %ctx.repo(), paths = rels.len(), ?count, skip, "log");

        let repo = open_repo(&ctx)?;
        let eng = |e: git2::Error| StoreError::engine(ctx.repo(), e);

        let mut records = RecordSet::new();

        if count != Some(0) {
            if let Some(tip) = head_commit(&repo).map_err(eng)? {
                let mut walk = repo.revwalk().map_err(eng)?;
                walk.push(tip.id()).map_err(eng)?;
                walk.set_sorting(Sort::TIME | Sort::TOPOLOGICAL).map_err(eng)?;

                let mut skipped = 0;
                let mut taken = 0;
                for oid in walk {
                    let oid = oid.map_err(eng)?;
                    let commit = repo.find_commit(oid).map_err(eng)?;
                    if !commit_touches(&repo, &commit, &rels).map_err(eng)? {
                        continue;
                    }
                    if skipped < skip {
                        skipped += 1;
                        continue;
                    }
                    records.insert(CommitRecord::from_commit(&commit));
                    taken += 1;
                    if count.is_some_and(|c| taken >= c) {
                        break;
                    }
                }
            }
        }

        merge_tags(&repo, &mut records).map_err(eng)?;

        Ok(records.into_vec())
    }
}

/// Whether a commit's tree differs from its first parent's at any of the
/// given paths. Root commits are compared against the empty tree.
fn commit_touches(
    repo: &Repository,
    commit: &Commit<'_>,
    paths: &[SafePath],
) -> Result<bool, git2::Error> {
    let tree = commit.tree()?;
    let parent_tree = match commit.parent(0) {
        Ok(parent) => Some(parent.tree()?),
        Err(_) => None,
    };

    let mut opts = DiffOptions::new();
    // literal paths, not glob patterns; directory prefixes still match
    opts.disable_pathspec_match(true);
    for path in paths {
        opts.pathspec(path.as_str());
    }

    let diff = repo.diff_tree_to_tree(parent_tree.as_ref(), Some(&tree), Some(&mut opts))?;
    Ok(diff.deltas().len() > 0)
}

/// The most recent commit, starting at `start` and walking backwards,
/// whose tree differs from its first parent's at `path`.
pub(super) fn first_touching<'repo>(
    repo: &'repo Repository,
    start: git2::Oid,
    path: &SafePath,
) -> Result<Option<Commit<'repo>>, git2::Error> {
    let mut walk = repo.revwalk()?;
    walk.push(start)?;
    walk.set_sorting(Sort::TIME | Sort::TOPOLOGICAL)?;

    let paths = std::slice::from_ref(path);
    for oid in walk {
        let commit = repo.find_commit(oid?)?;
        if commit_touches(repo, &commit, paths)? {
            return Ok(Some(commit));
        }
    }
    Ok(None)
}

/// Fold every tag reference of the repository into the record set.
fn merge_tags(repo: &Repository, records: &mut RecordSet) -> Result<(), git2::Error> {
    let names = repo.tag_names(None)?;

    for name in names.iter().flatten() {
        let reference = repo.find_reference(&format!("refs/tags/{}", name))?;
        let oid = match reference.target() {
            Some(oid) => oid,
            None => continue,
        };
        let object = repo.find_object(oid, None)?;

        match object.into_tag() {
            Ok(tag) => {
                let tagged = tag.target_id().to_string();
                // tag records only accompany commits already in the set
                if records.contains(&tagged) {
                    records.insert(CommitRecord::from_tag(&tag));
                    if let Some(target) = records.get_mut(&tagged) {
                        let tag_name = tag.name().unwrap_or("").to_string();
                        target.tags.get_or_insert_with(Vec::new).push(tag_name);
                    }
                }
            }
            Err(object) => match object.into_commit() {
                Ok(commit) => {
                    records.insert_if_absent(CommitRecord::from_commit(&commit));
                }
                Err(_) => {
                    return Err(git2::Error::from_str("invalid tag reference"));
                }
            },
        }
    }

    Ok(())
}
