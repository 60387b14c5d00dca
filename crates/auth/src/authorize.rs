//! Role/ownership decision table.
//!
//! `decide` is a pure function of `(Subject, Action, Resource)`; operations
//! call [`authorize`] before touching any state, so an unauthorized caller
//! learns nothing about which records exist.

use std::collections::BTreeSet;

use serde::Serialize;
use thiserror::Error;

use usergate_core::{DomainError, UserId};

use crate::{PermissionName, Subject};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Action {
    List,
    Create,
    Retrieve,
    Update,
    Destroy,
}

impl core::fmt::Display for Action {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(match self {
            Action::List => "list",
            Action::Create => "create",
            Action::Retrieve => "retrieve",
            Action::Update => "update",
            Action::Destroy => "destroy",
        })
    }
}

/// What an action is aimed at.
///
/// Self-service resources carry the id of the account they belong to, which
/// is compared against the caller for the ownership column of the table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Resource {
    /// Login and token refresh.
    Session,
    /// Username availability probe ahead of signup.
    UsernameAvailability,
    Users,
    Groups,
    Permissions,
    UserGroups,
    UserPermissions,
    GroupPermissions,
    Profile(UserId),
    ProfileGroups(UserId),
    ProfilePermissions(UserId),
    Password(UserId),
}

impl Resource {
    /// Account that owns a self-service resource.
    pub fn owner(&self) -> Option<UserId> {
        match self {
            Resource::Profile(id)
            | Resource::ProfileGroups(id)
            | Resource::ProfilePermissions(id)
            | Resource::Password(id) => Some(*id),
            _ => None,
        }
    }

    fn is_public(&self, action: Action) -> bool {
        matches!(
            (self, action),
            (Resource::Session, Action::Create) | (Resource::UsernameAvailability, Action::Retrieve)
        )
    }

    fn allows_owner(&self, action: Action) -> bool {
        match self {
            Resource::Profile(_) => matches!(action, Action::Retrieve | Action::Update),
            Resource::ProfileGroups(_) | Resource::ProfilePermissions(_) => {
                matches!(action, Action::List | Action::Retrieve)
            }
            Resource::Password(_) => action == Action::Update,
            _ => false,
        }
    }
}

impl core::fmt::Display for Resource {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(match self {
            Resource::Session => "session",
            Resource::UsernameAvailability => "username availability",
            Resource::Users => "users",
            Resource::Groups => "groups",
            Resource::Permissions => "permissions",
            Resource::UserGroups => "user groups",
            Resource::UserPermissions => "user permissions",
            Resource::GroupPermissions => "group permissions",
            Resource::Profile(_) => "profile",
            Resource::ProfileGroups(_) => "profile groups",
            Resource::ProfilePermissions(_) => "profile permissions",
            Resource::Password(_) => "password",
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DenialKind {
    /// Anonymous caller on a non-public resource.
    Unauthenticated,
    /// Admin role required.
    MissingRole,
    /// Self-service resource of another account.
    NotOwner,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Allow,
    Deny(DenialKind),
}

impl Decision {
    pub fn is_allowed(&self) -> bool {
        *self == Decision::Allow
    }
}

/// Evaluate the decision table, first matching rule wins:
///
/// 1. login/refresh and the signup check are open to everyone;
/// 2. anonymous callers are denied everything else;
/// 3. admins may do everything;
/// 4. members may read their own profile, groups and permissions, update
///    their own profile and change their own password;
/// 5. anything else is denied.
pub fn decide(subject: &Subject, action: Action, resource: Resource) -> Decision {
    if resource.is_public(action) {
        return Decision::Allow;
    }

    let Some(identity) = subject.identity() else {
        return Decision::Deny(DenialKind::Unauthenticated);
    };

    if identity.is_admin() {
        return Decision::Allow;
    }

    match resource.owner() {
        Some(owner) if owner == identity.user_id && resource.allows_owner(action) => Decision::Allow,
        Some(owner) if owner != identity.user_id => Decision::Deny(DenialKind::NotOwner),
        _ => Decision::Deny(DenialKind::MissingRole),
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AuthzError {
    #[error("authentication required")]
    Unauthenticated,

    #[error("forbidden: {0}")]
    Forbidden(String),
}

impl From<AuthzError> for DomainError {
    fn from(value: AuthzError) -> Self {
        match value {
            AuthzError::Unauthenticated => DomainError::Unauthenticated,
            AuthzError::Forbidden(msg) => DomainError::Forbidden(msg),
        }
    }
}

/// Authorize `action` on `resource`, or explain the denial.
///
/// - No IO
/// - No panics
pub fn authorize(subject: &Subject, action: Action, resource: Resource) -> Result<(), AuthzError> {
    match decide(subject, action, resource) {
        Decision::Allow => Ok(()),
        Decision::Deny(kind) => {
            tracing::debug!(
                user = ?subject.user_id(),
                %action,
                %resource,
                ?kind,
                "authorization denied"
            );
            Err(match kind {
                DenialKind::Unauthenticated => AuthzError::Unauthenticated,
                DenialKind::MissingRole => {
                    AuthzError::Forbidden(format!("{action} on {resource} requires admin"))
                }
                DenialKind::NotOwner => {
                    AuthzError::Forbidden(format!("{resource} belongs to another account"))
                }
            })
        }
    }
}

/// Effective permission set: direct grants ∪ grants of every group.
pub fn effective_permissions<'a, D, G>(direct: D, via_groups: G) -> BTreeSet<PermissionName>
where
    D: IntoIterator<Item = &'a PermissionName>,
    G: IntoIterator<Item = &'a PermissionName>,
{
    direct.into_iter().chain(via_groups).cloned().collect()
}
