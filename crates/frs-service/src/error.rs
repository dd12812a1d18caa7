use thiserror::Error;

use frs_store::StoreError;
use frs_version::VersionError;

/// Coarse classification of a [`ServiceError`], for adapters that map
/// failures onto status codes.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Configuration,
    Validation,
    NotFound,
    Conflict,
    /// Repository or version control failure other than not-found.
    Upstream,
}

/// Errors from entity service operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ServiceError {
    /// The service cannot run with its configuration.
    #[error("configuration error: {0}")]
    Config(String),

    /// Input rejected by a hook or by the request adapter.
    #[error("validation failed: {0}")]
    Validation(String),

    /// A precondition found the addressed item missing.
    #[error("not found: {0}")]
    NotFound(String),

    /// A precondition found the addressed item already present.
    #[error("conflict: {0}")]
    Conflict(String),

    #[error("store error: {0}")]
    Store(#[from] StoreError),

    #[error("version error: {0}")]
    Version(#[from] VersionError),
}

impl ServiceError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Config(_) => ErrorKind::Configuration,
            Self::Validation(_) => ErrorKind::Validation,
            Self::NotFound(_) => ErrorKind::NotFound,
            Self::Conflict(_) => ErrorKind::Conflict,
            Self::Store(e) if e.is_not_found() => ErrorKind::NotFound,
            Self::Version(e) if e.is_not_found() => ErrorKind::NotFound,
            Self::Store(_) | Self::Version(_) => ErrorKind::Upstream,
        }
    }

    pub fn is_not_found(&self) -> bool {
        self.kind() == ErrorKind::NotFound
    }
}

/// Result alias for entity service operations.
pub type ServiceResult<T> = Result<T, ServiceError>;
