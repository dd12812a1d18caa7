use chrono::{DateTime, Utc};
use thiserror::Error;

/// Errors from version control operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum VersionError {
    /// The group name cannot address a directory.
    #[error("invalid group {group:?}: {reason}")]
    InvalidGroup { group: String, reason: String },

    /// No commit in the group matches the identifier.
    #[error("unknown commit {commit} in group {group}")]
    UnknownCommit { group: String, commit: String },

    /// The group has no commit made at or before the timestamp.
    #[error("no commit in group {group} at or before {at}")]
    NoCommitAt { group: String, at: DateTime<Utc> },

    /// Another writer committed after the snapshot was opened.
    #[error("stale snapshot for group {group}: opened on {base}, head is {head}")]
    StaleSnapshot {
        group: String,
        base: String,
        head: String,
    },

    /// A lock guarding group state was poisoned by a panicking writer.
    #[error("lock poisoned: {0}")]
    LockPoisoned(String),
}

impl VersionError {
    /// Returns `true` when the requested revision does not exist.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::UnknownCommit { .. } | Self::NoCommitAt { .. })
    }
}

/// Result alias for version control operations.
pub type VersionResult<T> = Result<T, VersionError>;
