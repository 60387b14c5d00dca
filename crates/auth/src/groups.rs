use std::borrow::Cow;

use serde::{Deserialize, Serialize};

use usergate_core::{DomainError, DomainResult};

use crate::protected::Protected;

/// The built-in group of administrators. Protected.
pub const SUPERUSER_GROUP: GroupName = GroupName::from_static("superuser");

/// Group identifier; the unique name is the primary key.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct GroupName(Cow<'static, str>);

impl GroupName {
    pub const fn from_static(name: &'static str) -> Self {
        Self(Cow::Borrowed(name))
    }

    pub fn parse(name: impl Into<String>) -> DomainResult<Self> {
        let name = name.into();
        let name = name.trim();
        if name.is_empty() {
            return Err(DomainError::validation("group name cannot be empty"));
        }
        if name.len() > 150 {
            return Err(DomainError::validation("group name is longer than 150 characters"));
        }
        if name.chars().any(char::is_whitespace) {
            return Err(DomainError::validation(format!(
                "invalid group name '{name}': whitespace is not allowed"
            )));
        }
        Ok(Self(Cow::Owned(name.to_string())))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Protected for GroupName {
    const KIND: &'static str = "group";

    fn is_protected(&self) -> bool {
        *self == SUPERUSER_GROUP
    }
}

impl core::fmt::Display for GroupName {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.0)
    }
}
