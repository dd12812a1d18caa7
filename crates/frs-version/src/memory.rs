//! In-memory version control.
//!
//! Every group is a linear list of commits, each holding a full copy of the
//! group's file tree. Suitable for tests and embedding; nothing survives
//! the process.

use std::collections::HashMap;
use std::fmt;
use std::sync::RwLock;

use chrono::{DateTime, Utc};
use tracing::{debug, info};

use frs_types::{is_under, CommitId, FileTree, HistoryEntry, Revision};

use crate::error::{VersionError, VersionResult};
use crate::snapshot::{CommitRequest, ReadSnapshot, WriteSnapshot};
use crate::traits::{Clock, SystemClock, VersionControl};

/// Shortest commit prefix accepted when resolving a revision.
const MIN_PREFIX: usize = 4;

#[derive(Clone, Debug)]
struct CommitRecord {
    id: CommitId,
    parent: Option<CommitId>,
    tree: FileTree,
    author: String,
    message: String,
    timestamp: DateTime<Utc>,
    changes: Vec<String>,
}

impl CommitRecord {
    fn compute_id(
        parent: Option<CommitId>,
        tree: &FileTree,
        request: &CommitRequest,
        timestamp: DateTime<Utc>,
    ) -> CommitId {
        let mut hasher = blake3::Hasher::new();
        hasher.update(b"frs-commit");
        let parent_bytes: &[u8; 32] = parent.as_ref().map_or(&[0u8; 32], |c| c.as_bytes());
        hasher.update(parent_bytes);
        hasher.update(&tree.digest());
        for field in [request.author.as_str(), request.message.as_str()] {
            hasher.update(&(field.len() as u64).to_le_bytes());
            hasher.update(field.as_bytes());
        }
        hasher.update(timestamp.to_rfc3339().as_bytes());
        CommitId::from_hash(*hasher.finalize().as_bytes())
    }

    fn entry(&self, changes: Vec<String>) -> HistoryEntry {
        HistoryEntry {
            commit: self.id,
            parent: self.parent,
            author: self.author.clone(),
            message: self.message.clone(),
            timestamp: self.timestamp,
            changes,
        }
    }
}

fn poisoned<E: fmt::Display>(err: E) -> VersionError {
    VersionError::LockPoisoned(err.to_string())
}

fn validate_group(group: &str) -> VersionResult<()> {
    if group.trim().is_empty() {
        return Err(VersionError::InvalidGroup {
            group: group.to_string(),
            reason: "group must not be blank".into(),
        });
    }
    if group.trim() != group {
        return Err(VersionError::InvalidGroup {
            group: group.to_string(),
            reason: "group must not have surrounding whitespace".into(),
        });
    }
    Ok(())
}

fn describe(commit: Option<CommitId>) -> String {
    commit.map_or_else(|| "<none>".to_string(), |c| c.short_hex())
}

fn find_commit<'a>(group: &str, commits: &'a [CommitRecord], text: &str) -> VersionResult<&'a CommitRecord> {
    let needle = text.trim().to_ascii_lowercase();
    let unknown = || VersionError::UnknownCommit {
        group: group.to_string(),
        commit: text.to_string(),
    };
    if needle.len() == 64 {
        let id = CommitId::from_hex(&needle).map_err(|_| unknown())?;
        return commits.iter().find(|c| c.id == id).ok_or_else(unknown);
    }
    if needle.len() < MIN_PREFIX || !needle.chars().all(|c| c.is_ascii_hexdigit()) {
        return Err(unknown());
    }
    let mut matches = commits.iter().filter(|c| c.id.to_hex().starts_with(&needle));
    match (matches.next(), matches.next()) {
        (Some(found), None) => Ok(found),
        _ => Err(unknown()),
    }
}

fn resolve<'a>(
    group: &str,
    commits: &'a [CommitRecord],
    revision: &Revision,
) -> VersionResult<Option<&'a CommitRecord>> {
    if let Some(text) = &revision.commit {
        return find_commit(group, commits, text).map(Some);
    }
    if let Some(at) = revision.at {
        return commits
            .iter()
            .rev()
            .find(|c| c.timestamp <= at)
            .map(Some)
            .ok_or_else(|| VersionError::NoCommitAt {
                group: group.to_string(),
                at,
            });
    }
    Ok(commits.last())
}

/// [`VersionControl`] implementation backed by a `HashMap` of groups.
pub struct InMemoryVersionControl {
    groups: RwLock<HashMap<String, Vec<CommitRecord>>>,
    clock: Box<dyn Clock>,
}

impl InMemoryVersionControl {
    pub fn new() -> Self {
        Self::with_clock(SystemClock)
    }

    /// Use `clock` for commit timestamps.
    pub fn with_clock(clock: impl Clock + 'static) -> Self {
        Self {
            groups: RwLock::new(HashMap::new()),
            clock: Box::new(clock),
        }
    }

    /// Number of commits recorded for `group`.
    pub fn commit_count(&self, group: &str) -> VersionResult<usize> {
        let groups = self.groups.read().map_err(poisoned)?;
        Ok(groups.get(group).map_or(0, Vec::len))
    }

    /// Names of every known group, sorted.
    pub fn groups(&self) -> VersionResult<Vec<String>> {
        let groups = self.groups.read().map_err(poisoned)?;
        let mut names: Vec<String> = groups.keys().cloned().collect();
        names.sort();
        Ok(names)
    }
}

impl Default for InMemoryVersionControl {
    fn default() -> Self {
        Self::new()
    }
}

impl VersionControl for InMemoryVersionControl {
    fn read_directory(&self, group: &str, revision: &Revision) -> VersionResult<ReadSnapshot> {
        validate_group(group)?;
        let groups = self.groups.read().map_err(poisoned)?;
        let commits = groups.get(group).map_or(&[][..], Vec::as_slice);
        let record = resolve(group, commits, revision)?;
        Ok(ReadSnapshot::new(
            group,
            record.map(|r| r.id),
            record.map(|r| r.tree.clone()).unwrap_or_default(),
        ))
    }

    fn write_directory(&self, group: &str) -> VersionResult<WriteSnapshot> {
        validate_group(group)?;
        let mut groups = self.groups.write().map_err(poisoned)?;
        let commits = groups.entry(group.to_string()).or_insert_with(|| {
            info!(group, "group created");
            Vec::new()
        });
        let head = commits.last();
        Ok(WriteSnapshot::new(
            group,
            head.map(|r| r.id),
            head.map(|r| r.tree.clone()).unwrap_or_default(),
        ))
    }

    fn commit(&self, snapshot: WriteSnapshot, request: &CommitRequest) -> VersionResult<Option<CommitId>> {
        let group = snapshot.group().to_string();
        validate_group(&group)?;
        let mut groups = self.groups.write().map_err(poisoned)?;
        let commits = groups.entry(group.clone()).or_insert_with(|| {
            info!(group = %group, "group created");
            Vec::new()
        });

        let head = commits.last().map(|r| r.id);
        if snapshot.base() != head {
            return Err(VersionError::StaleSnapshot {
                group,
                base: describe(snapshot.base()),
                head: describe(head),
            });
        }

        let changes = match commits.last() {
            Some(previous) => snapshot.tree().diff(&previous.tree),
            None => snapshot.tree().diff(&FileTree::new()),
        };
        if changes.is_empty() {
            debug!(group = %group, "nothing to commit");
            return Ok(None);
        }

        let timestamp = self.clock.now();
        let tree = snapshot.into_tree();
        let id = CommitRecord::compute_id(head, &tree, request, timestamp);
        debug!(
            group = %group,
            commit = %id.short_hex(),
            changes = changes.len(),
            message = %request.message,
            "committed"
        );
        commits.push(CommitRecord {
            id,
            parent: head,
            tree,
            author: request.author.clone(),
            message: request.message.clone(),
            timestamp,
            changes,
        });
        Ok(Some(id))
    }

    fn history(&self, group: &str, path: &str, skip: usize, max: Option<usize>) -> VersionResult<Vec<HistoryEntry>> {
        validate_group(group)?;
        let location = path.trim_matches('/');
        let groups = self.groups.read().map_err(poisoned)?;
        let Some(commits) = groups.get(group) else {
            return Ok(Vec::new());
        };
        Ok(commits
            .iter()
            .rev()
            .filter_map(|record| {
                let changes: Vec<String> = record
                    .changes
                    .iter()
                    .filter(|p| is_under(p, location))
                    .cloned()
                    .collect();
                (!changes.is_empty()).then(|| record.entry(changes))
            })
            .skip(skip)
            .take(max.unwrap_or(usize::MAX))
            .collect())
    }
}
