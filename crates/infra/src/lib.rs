//! Infrastructure layer: identity store, relation engine, credentials and
//! seed data.

pub mod association;
pub mod credentials;
pub mod fixtures;
pub mod store;

pub use association::{
    Association, AssociationManager, GROUP_PERMISSIONS, USER_GROUPS, USER_PERMISSIONS,
};
pub use credentials::CredentialVerifier;
pub use fixtures::{Fixture, FixtureSummary, bootstrap_admin};
pub use store::{Directory, IdentityStore, InMemoryIdentityStore, LinkSet, StoreError};
