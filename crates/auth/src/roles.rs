use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::permissions::{ADMIN_PERMISSION, PermissionName};

/// Role used by the decision table.
///
/// Roles are derived, never stored: a user is `Admin` when the account carries
/// the superuser flag or when `users.admin` is among its effective permissions
/// (typically through membership in the `superuser` group).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Admin,
    Member,
}

impl Role {
    pub fn derive(is_admin: bool, effective: &BTreeSet<PermissionName>) -> Self {
        if is_admin || effective.contains(&ADMIN_PERMISSION) {
            Role::Admin
        } else {
            Role::Member
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::Member => "member",
        }
    }
}

impl core::fmt::Display for Role {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}
