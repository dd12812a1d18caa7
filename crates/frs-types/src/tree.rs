//! In-memory file tree: the content of a directory snapshot.
//!
//! Paths are slash-separated and relative to the group root. A path "is
//! under" a prefix when it equals the prefix or continues it after a `/`;
//! `a/b` is under `a` but `ab` is not. The empty prefix covers everything.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Ordered mapping from relative paths to file contents.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileTree {
    files: BTreeMap<String, Vec<u8>>,
}

/// Returns `true` if `path` is `prefix` itself or lies beneath it.
pub fn is_under(path: &str, prefix: &str) -> bool {
    if prefix.is_empty() {
        return true;
    }
    match path.strip_prefix(prefix) {
        Some(rest) => rest.is_empty() || rest.starts_with('/') || prefix.ends_with('/'),
        None => false,
    }
}

impl FileTree {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    pub fn get(&self, path: &str) -> Option<&[u8]> {
        self.files.get(path).map(Vec::as_slice)
    }

    pub fn contains(&self, path: &str) -> bool {
        self.files.contains_key(path)
    }

    /// Write a file, returning the previous content if any.
    pub fn insert(&mut self, path: impl Into<String>, content: impl Into<Vec<u8>>) -> Option<Vec<u8>> {
        self.files.insert(path.into(), content.into())
    }

    pub fn remove(&mut self, path: &str) -> Option<Vec<u8>> {
        self.files.remove(path)
    }

    /// Iterate files under `prefix` in path order.
    pub fn list<'a>(&'a self, prefix: &'a str) -> impl Iterator<Item = (&'a str, &'a [u8])> + 'a {
        self.files
            .range(prefix.to_string()..)
            .take_while(move |(path, _)| path.starts_with(prefix))
            .filter(move |(path, _)| is_under(path, prefix))
            .map(|(path, content)| (path.as_str(), content.as_slice()))
    }

    /// Returns `true` if at least one file lies under `prefix`.
    pub fn has_under(&self, prefix: &str) -> bool {
        self.list(prefix).next().is_some()
    }

    /// Remove every file under `prefix`; returns how many were removed.
    pub fn remove_under(&mut self, prefix: &str) -> usize {
        let doomed: Vec<String> = self.list(prefix).map(|(p, _)| p.to_string()).collect();
        for path in &doomed {
            self.files.remove(path);
        }
        doomed.len()
    }

    pub fn paths(&self) -> impl Iterator<Item = &str> {
        self.files.keys().map(String::as_str)
    }

    /// Paths added, removed, or modified between `self` and `other`, sorted.
    pub fn diff(&self, other: &FileTree) -> Vec<String> {
        let mut changed: Vec<String> = self
            .files
            .iter()
            .filter(|(path, content)| other.files.get(*path) != Some(*content))
            .map(|(path, _)| path.clone())
            .collect();
        changed.extend(
            other
                .files
                .keys()
                .filter(|path| !self.files.contains_key(*path))
                .cloned(),
        );
        changed.sort();
        changed
    }

    /// BLAKE3 digest over every path and its content, in path order.
    pub fn digest(&self) -> [u8; 32] {
        let mut hasher = blake3::Hasher::new();
        for (path, content) in &self.files {
            hasher.update(&(path.len() as u64).to_le_bytes());
            hasher.update(path.as_bytes());
            hasher.update(&(content.len() as u64).to_le_bytes());
            hasher.update(content);
        }
        *hasher.finalize().as_bytes()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> FileTree {
        let mut tree = FileTree::new();
        tree.insert("widget/acme/w1/entity.json", "{}");
        tree.insert("widget/acme/w1/@resources/a.txt", "a");
        tree.insert("widget/acme/w10/entity.json", "{}");
        tree.insert("widget/acmex/entity.json", "{}");
        tree
    }

    #[test]
    fn is_under_respects_segment_boundaries() {
        assert!(is_under("a/b", "a"));
        assert!(is_under("a", "a"));
        assert!(!is_under("ab", "a"));
        assert!(is_under("anything", ""));
        assert!(is_under("a/b", "a/"));
    }

    #[test]
    fn list_stays_within_prefix() {
        let tree = sample();
        let under: Vec<&str> = tree.list("widget/acme/w1").map(|(p, _)| p).collect();
        assert_eq!(
            under,
            vec!["widget/acme/w1/@resources/a.txt", "widget/acme/w1/entity.json"]
        );
        assert_eq!(tree.list("widget/acme").count(), 3);
    }

    #[test]
    fn remove_under_only_touches_prefix() {
        let mut tree = sample();
        assert_eq!(tree.remove_under("widget/acme/w1"), 2);
        assert!(tree.contains("widget/acme/w10/entity.json"));
        assert!(!tree.has_under("widget/acme/w1"));
    }

    #[test]
    fn diff_reports_added_removed_modified() {
        let before = sample();
        let mut after = before.clone();
        after.insert("widget/acme/w1/entity.json", r#"{"x":1}"#);
        after.remove("widget/acmex/entity.json");
        after.insert("widget/new/entity.json", "{}");
        assert_eq!(
            after.diff(&before),
            vec![
                "widget/acme/w1/entity.json",
                "widget/acmex/entity.json",
                "widget/new/entity.json",
            ]
        );
        assert!(before.diff(&before.clone()).is_empty());
    }

    #[test]
    fn digest_tracks_content() {
        let a = sample();
        let mut b = a.clone();
        assert_eq!(a.digest(), b.digest());
        b.insert("x", "y");
        assert_ne!(a.digest(), b.digest());
    }
}
