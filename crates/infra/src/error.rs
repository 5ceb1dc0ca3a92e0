//! Storage-layer errors for catalogue records.

use thiserror::Error;

/// Errors raised by record stores (in-memory or Postgres).
///
/// `ConstraintViolation` is the storage-level rejection of an insert that
/// would break a uniqueness constraint (duplicate slug, duplicate pair).
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("unique constraint '{constraint}' violated: {detail}")]
    ConstraintViolation {
        constraint: &'static str,
        detail: String,
    },

    #[error("record not found")]
    NotFound,

    #[error("invalid value: {0}")]
    InvalidValue(String),

    #[error("storage backend error: {0}")]
    Backend(String),
}

impl StoreError {
    pub fn constraint(constraint: &'static str, detail: impl Into<String>) -> Self {
        Self::ConstraintViolation {
            constraint,
            detail: detail.into(),
        }
    }

    pub(crate) fn poisoned() -> Self {
        Self::Backend("lock poisoned".to_string())
    }

    pub fn is_constraint_violation(&self) -> bool {
        matches!(self, StoreError::ConstraintViolation { .. })
    }
}
