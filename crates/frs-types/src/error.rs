use thiserror::Error;

/// Errors produced by type operations.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TypeError {
    #[error("invalid hex string: {0}")]
    InvalidHex(String),

    #[error("invalid byte length: expected {expected}, got {actual}")]
    InvalidLength { expected: usize, actual: usize },

    #[error("invalid {kind} expression: {reason}")]
    InvalidExpression { kind: &'static str, reason: String },

    #[error("timestamp out of range: {0} ms")]
    InvalidTimestamp(i64),

    #[error("invalid resource path {path:?}: {reason}")]
    InvalidPath { path: String, reason: String },
}

impl TypeError {
    pub(crate) fn expression(kind: &'static str, reason: impl Into<String>) -> Self {
        Self::InvalidExpression {
            kind,
            reason: reason.into(),
        }
    }
}
