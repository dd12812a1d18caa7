//! Foundation types for frs.
//!
//! frs turns a directory of version-controlled files into CRUD-able
//! entities with properties and attached resources. This crate holds the
//! value types every other frs crate shares.
//!
//! # Key Types
//!
//! - [`Key`] -- Ordered identifying tuple for one entity
//! - [`Paging`], [`Sorting`], [`Filter`] -- Parsed query expressions
//! - [`Revision`] -- Commit/timestamp selector for historical reads
//! - [`Resource`] -- Binary or text attachment owned by an entity
//! - [`CommitId`], [`HistoryEntry`] -- Version history records
//! - [`FileTree`] -- Content of a directory snapshot

pub mod commit;
pub mod error;
pub mod key;
pub mod query;
pub mod resource;
pub mod tree;

pub use commit::{CommitId, HistoryEntry};
pub use error::TypeError;
pub use key::Key;
pub use query::{lookup, Comparison, Filter, Paging, Revision, SortKey, SortOrder, Sorting};
pub use resource::{normalize_resource_path, Resource, ResourceMetadata};
pub use tree::{is_under, FileTree};
