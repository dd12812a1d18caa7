use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::TypeError;

/// Descriptive data for a resource attached to an entity.
///
/// `path` is unique per entity and is relative to the entity's resource area.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceMetadata {
    pub path: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<DateTime<Utc>>,
}

impl ResourceMetadata {
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            content_type: None,
            description: None,
            timestamp: None,
        }
    }
}

/// A named binary or text attachment owned by one entity.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Resource {
    pub metadata: ResourceMetadata,
    #[serde(default)]
    pub content: Vec<u8>,
}

impl Resource {
    pub fn new(path: impl Into<String>, content: impl Into<Vec<u8>>) -> Self {
        Self {
            metadata: ResourceMetadata::new(path),
            content: content.into(),
        }
    }

    pub fn with_content_type(mut self, content_type: impl Into<String>) -> Self {
        self.metadata.content_type = Some(content_type.into());
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.metadata.description = Some(description.into());
        self
    }

    pub fn path(&self) -> &str {
        &self.metadata.path
    }

    /// Content as UTF-8 text, if it is valid UTF-8.
    pub fn text(&self) -> Option<&str> {
        std::str::from_utf8(&self.content).ok()
    }
}

/// Normalize a resource path: strip leading/trailing slashes and reject
/// empty, `.`/`..`, or blank segments.
///
/// ```
/// use frs_types::normalize_resource_path;
///
/// assert_eq!(normalize_resource_path("/docs/readme.md").unwrap(), "docs/readme.md");
/// assert!(normalize_resource_path("docs/../secret").is_err());
/// ```
pub fn normalize_resource_path(path: &str) -> Result<String, TypeError> {
    let invalid = |reason: &str| TypeError::InvalidPath {
        path: path.to_string(),
        reason: reason.to_string(),
    };
    let trimmed = path.trim().trim_matches('/');
    if trimmed.is_empty() {
        return Err(invalid("path must not be empty"));
    }
    for segment in trimmed.split('/') {
        if segment.trim().is_empty() {
            return Err(invalid("path segments must not be empty"));
        }
        if segment == "." || segment == ".." {
            return Err(invalid("relative segments are not allowed"));
        }
    }
    Ok(trimmed.to_string())
}
