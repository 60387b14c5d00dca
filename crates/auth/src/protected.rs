//! Records the system refuses to destroy.

use usergate_core::{DomainError, DomainResult};

/// A record that may be read and associated but never destroyed.
///
/// Consulted uniformly by every destroy path (entity delete and association
/// removal alike).
pub trait Protected: core::fmt::Display {
    /// Human-readable record kind used in error messages.
    const KIND: &'static str;

    fn is_protected(&self) -> bool;
}

/// Fail with `IntegrityViolation` if `record` is protected.
pub fn ensure_destroyable<T: Protected>(record: &T) -> DomainResult<()> {
    if record.is_protected() {
        return Err(DomainError::integrity(format!(
            "{} '{}' is protected and cannot be removed",
            T::KIND,
            record
        )));
    }
    Ok(())
}
