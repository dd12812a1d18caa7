//! Version port for frs.
//!
//! Groups of files evolve through linear commits. This crate hands out
//! request-scoped snapshots of a group:
//!
//! - [`ReadSnapshot`] -- immutable tree at the live head or at a
//!   [`Revision`](frs_types::Revision) (explicit commit or timestamp)
//! - [`WriteSnapshot`] -- mutable working copy of the head, turned into a
//!   commit by [`VersionControl::commit`]
//!
//! and answers path-scoped history queries, newest first.
//!
//! # Backends
//!
//! - [`InMemoryVersionControl`] -- full-tree copies per commit, for tests and
//!   embedding

pub mod error;
pub mod memory;
pub mod snapshot;
pub mod traits;

pub use error::{VersionError, VersionResult};
pub use memory::InMemoryVersionControl;
pub use snapshot::{CommitRequest, ReadSnapshot, WriteSnapshot};
pub use traits::{Clock, SystemClock, VersionControl};
