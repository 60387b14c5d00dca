//! `usergate-auth`: pure authentication/authorization boundary.
//!
//! This crate is intentionally decoupled from HTTP and storage: it owns the
//! identity model, the role/ownership decision table, token issuance and
//! validation, and password hashing. Nothing here performs IO.

pub mod authorize;
pub mod claims;
pub mod groups;
pub mod password;
pub mod permissions;
pub mod principal;
pub mod protected;
pub mod roles;
pub mod token;
pub mod user;

pub use authorize::{Action, AuthzError, Decision, DenialKind, Resource, authorize, decide, effective_permissions};
pub use claims::{JwtClaims, TokenError, TokenKind, validate_claims};
pub use groups::{GroupName, SUPERUSER_GROUP};
pub use password::{Argon2Hasher, CredentialError, CredentialHasher, PasswordPolicy};
pub use permissions::{ADMIN_PERMISSION, PermissionName};
pub use principal::{Identity, Subject};
pub use protected::{Protected, ensure_destroyable};
pub use roles::Role;
pub use token::{Hs256TokenService, TokenPair, TokenService};
pub use user::{AdminUserPatch, NewUser, ProfilePatch, User, UserRepresentation, validate_username};
