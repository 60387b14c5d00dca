//! Domain error model.

use thiserror::Error;

/// Result type used across the domain layer.
pub type DomainResult<T> = Result<T, DomainError>;

/// Domain-level error.
///
/// One variant per outward failure class. Callers must be able to tell a role
/// denial (`Forbidden`) apart from a structural refusal (`IntegrityViolation`)
/// and from a missing record (`NotFound`).
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// Missing/invalid credentials or token.
    #[error("authentication required")]
    Unauthenticated,

    /// Authenticated, but the role or ownership does not permit the action.
    #[error("forbidden: {0}")]
    Forbidden(String),

    /// A value failed validation (malformed input, duplicate unique field,
    /// reference to a missing related record, duplicate relation).
    #[error("validation failed: {0}")]
    Validation(String),

    /// An identifier was invalid (e.g. parse failure).
    #[error("invalid identifier: {0}")]
    InvalidId(String),

    /// The requested record or relation does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// The system refuses the change structurally (protected records).
    #[error("integrity violation: {0}")]
    IntegrityViolation(String),
}

impl DomainError {
    pub fn forbidden(msg: impl Into<String>) -> Self {
        Self::Forbidden(msg.into())
    }

    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn invalid_id(msg: impl Into<String>) -> Self {
        Self::InvalidId(msg.into())
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    pub fn integrity(msg: impl Into<String>) -> Self {
        Self::IntegrityViolation(msg.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages_carry_context() {
        assert_eq!(
            DomainError::integrity("group 'superuser' is protected").to_string(),
            "integrity violation: group 'superuser' is protected"
        );
        assert_eq!(DomainError::Unauthenticated.to_string(), "authentication required");
    }
}
