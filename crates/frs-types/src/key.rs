use std::fmt;

use serde::{Deserialize, Serialize};

/// Ordered tuple of identifying values that addresses one entity.
///
/// Keys are compared component-wise. `PartialEq` is exact; use
/// [`Key::matches_ignore_case`] when comparing an addressed key against the
/// key derived from submitted content.
#[derive(Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Key(Vec<String>);

impl Key {
    /// Separator used by [`fmt::Display`] and by [`Key::parse_default`].
    pub const SEPARATOR: &'static str = ";";

    /// Build a key from its components, in order.
    pub fn new<I, S>(components: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self(components.into_iter().map(Into::into).collect())
    }

    /// The empty key. Addresses the whole group (e.g. group-wide history).
    pub const fn empty() -> Self {
        Self(Vec::new())
    }

    /// Split `text` on `separator`, trimming each component.
    ///
    /// Blank text yields the empty key.
    pub fn parse(text: &str, separator: &str) -> Self {
        if text.trim().is_empty() {
            return Self::empty();
        }
        if separator.is_empty() {
            return Self(vec![text.trim().to_string()]);
        }
        Self(text.split(separator).map(|c| c.trim().to_string()).collect())
    }

    /// Parse with [`Key::SEPARATOR`].
    pub fn parse_default(text: &str) -> Self {
        Self::parse(text, Self::SEPARATOR)
    }

    pub fn components(&self) -> &[String] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Returns `true` if the key can address an existing entity: at least one
    /// component and no blank components.
    pub fn is_addressable(&self) -> bool {
        !self.0.is_empty() && self.0.iter().all(|c| !c.trim().is_empty())
    }

    /// Component-wise, case-insensitive comparison.
    pub fn matches_ignore_case(&self, other: &Key) -> bool {
        self.0.len() == other.0.len()
            && self
                .0
                .iter()
                .zip(&other.0)
                .all(|(a, b)| a.to_lowercase() == b.to_lowercase())
    }

    /// Join the components with `separator`.
    pub fn join(&self, separator: &str) -> String {
        self.0.join(separator)
    }
}

impl fmt::Debug for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Key({:?})", self.0)
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.join(Self::SEPARATOR))
    }
}

impl From<Vec<String>> for Key {
    fn from(components: Vec<String>) -> Self {
        Self(components)
    }
}

impl From<&str> for Key {
    fn from(single: &str) -> Self {
        Self(vec![single.to_string()])
    }
}

impl<S: Into<String>> FromIterator<S> for Key {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Self::new(iter)
    }
}
