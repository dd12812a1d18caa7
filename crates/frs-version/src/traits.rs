use std::sync::Arc;

use chrono::{DateTime, Utc};

use frs_types::{CommitId, HistoryEntry, Revision};

use crate::error::VersionResult;
use crate::snapshot::{CommitRequest, ReadSnapshot, WriteSnapshot};

/// Snapshot and history provider for groups of versioned files.
///
/// A group is an independent line of commits. Implementations must make
/// [`VersionControl::commit`] atomic per group: a snapshot opened on a head
/// that has since moved is rejected rather than merged.
pub trait VersionControl: Send + Sync {
    /// Open a read snapshot of `group` at `revision`.
    ///
    /// A live revision on a group without commits yields an empty tree.
    fn read_directory(&self, group: &str, revision: &Revision) -> VersionResult<ReadSnapshot>;

    /// Open a write snapshot on the current head of `group`.
    fn write_directory(&self, group: &str) -> VersionResult<WriteSnapshot>;

    /// Record the snapshot's tree as the new head.
    ///
    /// Returns `None` without creating a commit when nothing changed.
    fn commit(&self, snapshot: WriteSnapshot, request: &CommitRequest) -> VersionResult<Option<CommitId>>;

    /// Commits touching `path` (or anything beneath it), newest first.
    /// The empty path selects every commit of the group.
    fn history(&self, group: &str, path: &str, skip: usize, max: Option<usize>) -> VersionResult<Vec<HistoryEntry>>;
}

impl<V: VersionControl + ?Sized> VersionControl for Arc<V> {
    fn read_directory(&self, group: &str, revision: &Revision) -> VersionResult<ReadSnapshot> {
        (**self).read_directory(group, revision)
    }

    fn write_directory(&self, group: &str) -> VersionResult<WriteSnapshot> {
        (**self).write_directory(group)
    }

    fn commit(&self, snapshot: WriteSnapshot, request: &CommitRequest) -> VersionResult<Option<CommitId>> {
        (**self).commit(snapshot, request)
    }

    fn history(&self, group: &str, path: &str, skip: usize, max: Option<usize>) -> VersionResult<Vec<HistoryEntry>> {
        (**self).history(group, path, skip, max)
    }
}

/// Source of commit timestamps.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// Wall-clock time.
#[derive(Clone, Copy, Debug, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}
