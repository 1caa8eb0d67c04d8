//! Domain error model.

use thiserror::Error;

/// Domain-level error.
///
/// Malformed input only. Authorization outcomes are *not* errors; they are
/// returned as decisions by the access layer.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// A value failed validation (e.g. malformed input).
    #[error("validation failed: {0}")]
    Validation(String),

    /// An identifier was invalid (e.g. parse failure).
    #[error("invalid identifier: {0}")]
    InvalidId(String),

    /// A role name outside the closed role enumeration.
    #[error("unknown role: {0}")]
    UnknownRole(String),

    /// An operation name outside the closed operation enumeration.
    #[error("unknown operation: {0}")]
    UnknownOperation(String),
}

impl DomainError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn invalid_id(msg: impl Into<String>) -> Self {
        Self::InvalidId(msg.into())
    }
}
