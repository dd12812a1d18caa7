use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::TypeError;

/// Identifier of one commit in a group's history.
///
/// A `CommitId` is the BLAKE3 hash of the commit's content (parent, tree
/// digest, author, message, timestamp).
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CommitId([u8; 32]);

impl CommitId {
    /// Create a `CommitId` from a pre-computed hash.
    pub fn from_hash(hash: [u8; 32]) -> Self {
        Self(hash)
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Short hex representation (first 8 characters).
    pub fn short_hex(&self) -> String {
        hex::encode(&self.0[..4])
    }

    pub fn from_hex(s: &str) -> Result<Self, TypeError> {
        let bytes = hex::decode(s).map_err(|e| TypeError::InvalidHex(e.to_string()))?;
        if bytes.len() != 32 {
            return Err(TypeError::InvalidLength {
                expected: 32,
                actual: bytes.len(),
            });
        }
        let mut arr = [0u8; 32];
        arr.copy_from_slice(&bytes);
        Ok(Self(arr))
    }
}

impl fmt::Debug for CommitId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "CommitId({})", self.short_hex())
    }
}

impl fmt::Display for CommitId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

/// One past mutation of an entity, a resource, or a whole group.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub commit: CommitId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent: Option<CommitId>,
    pub author: String,
    pub message: String,
    pub timestamp: DateTime<Utc>,
    /// Paths changed by this commit at or under the queried location.
    #[serde(default)]
    pub changes: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id_of(data: &[u8]) -> CommitId {
        CommitId::from_hash(*blake3::hash(data).as_bytes())
    }

    #[test]
    fn hex_roundtrip() {
        let id = id_of(b"commit");
        assert_eq!(CommitId::from_hex(&id.to_hex()).unwrap(), id);
    }

    #[test]
    fn from_hex_rejects_wrong_length() {
        let err = CommitId::from_hex("abcd").unwrap_err();
        assert_eq!(err, TypeError::InvalidLength { expected: 32, actual: 2 });
        assert!(matches!(CommitId::from_hex("zz"), Err(TypeError::InvalidHex(_))));
    }

    #[test]
    fn short_hex_is_prefix() {
        let id = id_of(b"x");
        assert!(id.to_hex().starts_with(&id.short_hex()));
        assert_eq!(format!("{id:?}"), format!("CommitId({})", id.short_hex()));
    }
}
