//! Repository port for frs.
//!
//! A repository maps typed entities onto files inside one directory
//! snapshot of a group. It never opens, commits, or discards snapshots
//! itself: callers hand it a [`FileTree`](frs_types::FileTree) borrowed
//! immutably for reads and mutably for writes.
//!
//! # Key Types
//!
//! - [`Entity`] -- a serde type that can derive its own [`Key`](frs_types::Key)
//! - [`Repository`] -- the port every storage layout implements
//! - [`FileRepository`] -- JSON-document layout, one directory per entity
//!
//! # Design Rules
//!
//! 1. An entity's key is a pure function of its content.
//! 2. Resources live beside their entity and are removed with it.
//! 3. Not-found, invalid input, and serialization failures are distinct
//!    [`StoreError`] variants so callers can map them to outcomes.

pub mod error;
pub mod file;
pub mod traits;

pub use error::{StoreError, StoreResult};
pub use file::FileRepository;
pub use traits::{Entity, PropertyMap, Repository};
