use serde::{Deserialize, Serialize};

use frs_types::{CommitId, FileTree};

/// Read-only view of a group's files at one commit (or the live head).
#[derive(Clone, Debug)]
pub struct ReadSnapshot {
    group: String,
    commit: Option<CommitId>,
    tree: FileTree,
}

impl ReadSnapshot {
    pub fn new(group: impl Into<String>, commit: Option<CommitId>, tree: FileTree) -> Self {
        Self {
            group: group.into(),
            commit,
            tree,
        }
    }

    pub fn group(&self) -> &str {
        &self.group
    }

    /// Commit the snapshot was taken at; `None` for a group with no commits.
    pub fn commit(&self) -> Option<CommitId> {
        self.commit
    }

    pub fn tree(&self) -> &FileTree {
        &self.tree
    }
}

/// Mutable working copy of a group's head.
///
/// Changes stay local to the snapshot until it is handed to
/// [`VersionControl::commit`](crate::VersionControl::commit). Dropping a
/// write snapshot discards its changes.
#[derive(Clone, Debug)]
pub struct WriteSnapshot {
    group: String,
    base: Option<CommitId>,
    tree: FileTree,
}

impl WriteSnapshot {
    pub fn new(group: impl Into<String>, base: Option<CommitId>, tree: FileTree) -> Self {
        Self {
            group: group.into(),
            base,
            tree,
        }
    }

    pub fn group(&self) -> &str {
        &self.group
    }

    /// Head commit at the time the snapshot was opened.
    pub fn base(&self) -> Option<CommitId> {
        self.base
    }

    pub fn tree(&self) -> &FileTree {
        &self.tree
    }

    pub fn tree_mut(&mut self) -> &mut FileTree {
        &mut self.tree
    }

    pub fn into_tree(self) -> FileTree {
        self.tree
    }
}

/// Who is committing and why.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitRequest {
    pub author: String,
    pub message: String,
}

impl CommitRequest {
    pub fn new(author: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            author: author.into(),
            message: message.into(),
        }
    }
}
