//! Identity store: the one shared, transactional resource.
//!
//! Operations run against a [`Directory`] inside either a read or a write
//! transaction. A write transaction is atomic: the closure sees a consistent
//! snapshot, and its changes become visible only if it returns `Ok`. Two
//! concurrent check-then-insert sequences therefore serialize, and exactly one
//! of them observes the record as absent.

use thiserror::Error;

use usergate_auth::{AuthzError, CredentialError};
use usergate_core::{DomainError, DomainResult};

pub mod directory;
pub mod in_memory;

pub use directory::{Directory, LinkSet};
pub use in_memory::InMemoryIdentityStore;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error(transparent)]
    Domain(#[from] DomainError),

    #[error("identity store lock poisoned")]
    Poisoned,

    #[error(transparent)]
    Credential(#[from] CredentialError),

    #[error("fixture error: {0}")]
    Fixture(String),
}

impl From<AuthzError> for StoreError {
    fn from(value: AuthzError) -> Self {
        StoreError::Domain(value.into())
    }
}

/// Abstract repository for users, groups, permissions and their relations.
///
/// The lock (or database transaction) is held for the duration of the closure
/// and released on every exit path.
pub trait IdentityStore: Send + Sync {
    fn read<R>(&self, f: impl FnOnce(&Directory) -> DomainResult<R>) -> Result<R, StoreError>;

    fn transaction<R>(
        &self,
        f: impl FnOnce(&mut Directory) -> DomainResult<R>,
    ) -> Result<R, StoreError>;
}

impl<S> IdentityStore for std::sync::Arc<S>
where
    S: IdentityStore,
{
    fn read<R>(&self, f: impl FnOnce(&Directory) -> DomainResult<R>) -> Result<R, StoreError> {
        (**self).read(f)
    }

    fn transaction<R>(
        &self,
        f: impl FnOnce(&mut Directory) -> DomainResult<R>,
    ) -> Result<R, StoreError> {
        (**self).transaction(f)
    }
}
