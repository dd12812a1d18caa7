use serde::{Deserialize, Serialize};

use crate::error::{ServiceError, ServiceResult};

fn default_author() -> String {
    "frs".into()
}

fn default_key_separator() -> String {
    ";".into()
}

fn default_list_separator() -> String {
    ",".into()
}

/// Settings for one entity service.
///
/// ```toml
/// group = "catalog"
/// author = "catalog-service"
/// key_separator = ";"
/// list_separator = ","
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceConfig {
    /// Version-control group every snapshot is opened in.
    #[serde(default)]
    pub group: String,
    /// Author recorded on commits.
    #[serde(default = "default_author")]
    pub author: String,
    /// Separator between key components in entity names.
    #[serde(default = "default_key_separator")]
    pub key_separator: String,
    /// Separator between property names in list parameters.
    #[serde(default = "default_list_separator")]
    pub list_separator: String,
}

impl ServiceConfig {
    pub fn new(group: impl Into<String>) -> Self {
        Self {
            group: group.into(),
            ..Self::default()
        }
    }

    pub fn with_author(mut self, author: impl Into<String>) -> Self {
        self.author = author.into();
        self
    }

    pub fn from_toml_str(text: &str) -> ServiceResult<Self> {
        toml::from_str(text).map_err(|e| ServiceError::Config(e.to_string()))
    }

    /// Reject settings no service can run with.
    pub fn validate(&self) -> ServiceResult<()> {
        if self.group.trim().is_empty() {
            return Err(ServiceError::Config("group is not configured".into()));
        }
        if self.author.trim().is_empty() {
            return Err(ServiceError::Config("author must not be blank".into()));
        }
        if self.key_separator.is_empty() {
            return Err(ServiceError::Config("key_separator must not be empty".into()));
        }
        if self.list_separator.is_empty() {
            return Err(ServiceError::Config("list_separator must not be empty".into()));
        }
        Ok(())
    }
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            group: String::new(),
            author: default_author(),
            key_separator: default_key_separator(),
            list_separator: default_list_separator(),
        }
    }
}
