use frs_types::{Key, TypeError};

/// Errors from repository operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    /// No entity is stored under the key.
    #[error("{type_name} not found: {key}")]
    EntityNotFound { type_name: String, key: Key },

    /// The entity exists but has no such property.
    #[error("property {name:?} not found on {key}")]
    PropertyNotFound { key: Key, name: String },

    /// The entity exists but has no resource at the path.
    #[error("resource {path:?} not found on {key}")]
    ResourceNotFound { key: Key, path: String },

    /// The key cannot address an entity in a file tree.
    #[error("invalid key {key}: {reason}")]
    InvalidKey { key: Key, reason: String },

    /// A property value cannot be applied to the entity.
    #[error("invalid value for property {name:?}: {reason}")]
    InvalidProperty { name: String, reason: String },

    /// A property change would move the entity to a different key.
    #[error("property change would alter the key from {from} to {to}")]
    KeyChange { from: Key, to: Key },

    /// A query expression or resource path was rejected.
    #[error("invalid input: {0}")]
    Invalid(#[from] TypeError),

    /// Entity or metadata (de)serialization failure.
    #[error("serialization error at {path}: {reason}")]
    Serialization { path: String, reason: String },
}

impl StoreError {
    /// Returns `true` for the entity/property/resource not-found variants.
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            Self::EntityNotFound { .. } | Self::PropertyNotFound { .. } | Self::ResourceNotFound { .. }
        )
    }
}

/// Result alias for repository operations.
pub type StoreResult<T> = Result<T, StoreError>;
