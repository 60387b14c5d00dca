use std::collections::BTreeSet;

use usergate_core::UserId;

use crate::{PermissionName, Role};

/// A resolved, authenticated actor.
///
/// Built fresh for every request from the identity store, so a membership or
/// grant change is visible on the very next call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub user_id: UserId,
    pub username: String,
    pub role: Role,
    pub permissions: BTreeSet<PermissionName>,
}

impl Identity {
    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }
}

/// Who is making a request. Passed explicitly into every core operation.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Subject {
    /// No token, or a token that failed to resolve.
    #[default]
    Anonymous,
    Authenticated(Identity),
}

impl Subject {
    pub fn identity(&self) -> Option<&Identity> {
        match self {
            Subject::Anonymous => None,
            Subject::Authenticated(identity) => Some(identity),
        }
    }

    pub fn user_id(&self) -> Option<UserId> {
        self.identity().map(|i| i.user_id)
    }
}

impl From<Identity> for Subject {
    fn from(value: Identity) -> Self {
        Subject::Authenticated(value)
    }
}
