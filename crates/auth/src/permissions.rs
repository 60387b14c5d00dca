use std::borrow::Cow;

use serde::{Deserialize, Serialize};

use usergate_core::{DomainError, DomainResult};

use crate::protected::Protected;

/// The permission that confers administrative rights. Protected.
pub const ADMIN_PERMISSION: PermissionName = PermissionName::from_static("users.admin");

/// Permission identifier.
///
/// Permissions are unique, dotted-namespace names (e.g. "users.admin",
/// "test.permission_1") with no further attributes.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PermissionName(Cow<'static, str>);

impl PermissionName {
    pub const fn from_static(name: &'static str) -> Self {
        Self(Cow::Borrowed(name))
    }

    /// Validate and wrap a caller-supplied name.
    pub fn parse(name: impl Into<String>) -> DomainResult<Self> {
        let name = name.into();
        let name = name.trim();
        if name.is_empty() {
            return Err(DomainError::validation("permission name cannot be empty"));
        }
        let valid = name.split('.').all(|segment| {
            !segment.is_empty()
                && segment
                    .chars()
                    .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
        });
        if !valid {
            return Err(DomainError::validation(format!(
                "invalid permission name '{name}': expected dotted segments of letters, digits, '_' or '-'"
            )));
        }
        Ok(Self(Cow::Owned(name.to_string())))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Protected for PermissionName {
    const KIND: &'static str = "permission";

    fn is_protected(&self) -> bool {
        *self == ADMIN_PERMISSION
    }
}

impl core::fmt::Display for PermissionName {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.0)
    }
}
