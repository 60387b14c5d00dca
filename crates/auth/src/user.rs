//! User account model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use usergate_core::{DomainError, DomainResult, UserId};

/// A user account as held by the identity store.
///
/// # Invariants
/// - `username` is unique across the store and never changes through
///   self-service.
/// - `password_hash` is only ever replaced through the credential verifier and
///   never leaves the store (see [`UserRepresentation`]).
#[derive(Clone, PartialEq, Eq)]
pub struct User {
    pub id: UserId,
    pub username: String,
    pub password_hash: String,
    pub first_name: String,
    pub last_name: String,
    /// Tenant/namespace tag; empty unless set explicitly.
    pub realm: String,
    /// Superuser flag.
    pub is_admin: bool,
    pub date_joined: DateTime<Utc>,
}

impl core::fmt::Debug for User {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("User")
            .field("id", &self.id)
            .field("username", &self.username)
            .field("password_hash", &"[REDACTED]")
            .field("first_name", &self.first_name)
            .field("last_name", &self.last_name)
            .field("realm", &self.realm)
            .field("is_admin", &self.is_admin)
            .field("date_joined", &self.date_joined)
            .finish()
    }
}

impl User {
    /// Build a validated account from a signup request and an already
    /// computed credential hash.
    pub fn from_signup(
        id: UserId,
        request: &NewUser,
        password_hash: String,
        now: DateTime<Utc>,
    ) -> DomainResult<Self> {
        request.validate()?;
        Ok(Self {
            id,
            username: request.username.trim().to_string(),
            password_hash,
            first_name: request.first_name.clone().unwrap_or_default(),
            last_name: request.last_name.clone().unwrap_or_default(),
            realm: request.realm.clone().unwrap_or_default(),
            is_admin: false,
            date_joined: now,
        })
    }

    /// Self-service update: name fields only.
    pub fn apply_profile(&mut self, patch: &ProfilePatch) {
        if let Some(first_name) = &patch.first_name {
            self.first_name = first_name.trim().to_string();
        }
        if let Some(last_name) = &patch.last_name {
            self.last_name = last_name.trim().to_string();
        }
    }

    /// Administrative update.
    pub fn apply_admin(&mut self, patch: &AdminUserPatch) {
        self.apply_profile(&ProfilePatch {
            first_name: patch.first_name.clone(),
            last_name: patch.last_name.clone(),
        });
        if let Some(realm) = &patch.realm {
            self.realm = realm.trim().to_string();
        }
        if let Some(is_admin) = patch.is_admin {
            self.is_admin = is_admin;
        }
    }

    pub fn representation(&self) -> UserRepresentation {
        UserRepresentation {
            id: self.id,
            username: self.username.clone(),
            first_name: self.first_name.clone(),
            last_name: self.last_name.clone(),
            realm: self.realm.clone(),
            is_admin: self.is_admin,
            date_joined: self.date_joined,
        }
    }
}

/// Outward view of a user. Has no credential field by construction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserRepresentation {
    pub id: UserId,
    pub username: String,
    pub first_name: String,
    pub last_name: String,
    pub realm: String,
    pub is_admin: bool,
    pub date_joined: DateTime<Utc>,
}

/// Signup request.
#[derive(Clone, Deserialize)]
pub struct NewUser {
    pub username: String,
    pub password: String,
    #[serde(default)]
    pub first_name: Option<String>,
    #[serde(default)]
    pub last_name: Option<String>,
    #[serde(default)]
    pub realm: Option<String>,
}

impl core::fmt::Debug for NewUser {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("NewUser")
            .field("username", &self.username)
            .field("password", &"[REDACTED]")
            .field("realm", &self.realm)
            .finish_non_exhaustive()
    }
}

impl NewUser {
    pub fn validate(&self) -> DomainResult<()> {
        validate_username(&self.username)?;
        if self.password.is_empty() {
            return Err(DomainError::validation("password cannot be empty"));
        }
        Ok(())
    }
}

/// Self-service profile update.
///
/// Only name fields exist here; `username` or `is_admin` in a request body
/// are dropped during deserialization.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct ProfilePatch {
    #[serde(default)]
    pub first_name: Option<String>,
    #[serde(default)]
    pub last_name: Option<String>,
}

/// Administrative user update. Username stays immutable.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct AdminUserPatch {
    #[serde(default)]
    pub first_name: Option<String>,
    #[serde(default)]
    pub last_name: Option<String>,
    #[serde(default)]
    pub realm: Option<String>,
    #[serde(default)]
    pub is_admin: Option<bool>,
}

/// Usernames: 1-150 characters of letters, digits and `@.+-_`.
pub fn validate_username(username: &str) -> DomainResult<()> {
    let username = username.trim();
    if username.is_empty() {
        return Err(DomainError::validation("username cannot be empty"));
    }
    if username.chars().count() > 150 {
        return Err(DomainError::validation("username is longer than 150 characters"));
    }
    if !username
        .chars()
        .all(|c| c.is_alphanumeric() || matches!(c, '@' | '.' | '+' | '-' | '_'))
    {
        return Err(DomainError::validation(
            "username may only contain letters, digits and @/./+/-/_",
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn signup(body: serde_json::Value) -> NewUser {
        serde_json::from_value(body).unwrap()
    }

    #[test]
    fn realm_defaults_to_empty() {
        let req = signup(serde_json::json!({ "username": "test_user_tmp", "password": "1234567" }));
        let user = User::from_signup(UserId::new(), &req, "hash".into(), Utc::now()).unwrap();
        assert_eq!(user.realm, "");
        assert!(!user.is_admin);

        let req = signup(serde_json::json!({ "username": "u", "password": "p", "realm": "acme" }));
        let user = User::from_signup(UserId::new(), &req, "hash".into(), Utc::now()).unwrap();
        assert_eq!(user.realm, "acme");
    }

    #[test]
    fn signup_validation() {
        let bad = [
            serde_json::json!({ "username": "", "password": "x" }),
            serde_json::json!({ "username": "has space", "password": "x" }),
            serde_json::json!({ "username": "ok", "password": "" }),
        ];
        for body in bad {
            let req = signup(body);
            assert!(matches!(req.validate(), Err(DomainError::Validation(_))));
        }
        assert!(validate_username("first.last+tag@example_1").is_ok());
    }

    #[test]
    fn profile_patch_drops_privileged_fields() {
        let patch: ProfilePatch = serde_json::from_value(serde_json::json!({
            "first_name": "new first name",
            "username": "hijack",
            "is_admin": true,
        }))
        .unwrap();

        let req = signup(serde_json::json!({ "username": "test_user", "password": "p" }));
        let mut user = User::from_signup(UserId::new(), &req, "hash".into(), Utc::now()).unwrap();
        user.apply_profile(&patch);

        assert_eq!(user.first_name, "new first name");
        assert_eq!(user.last_name, "");
        assert_eq!(user.username, "test_user");
        assert!(!user.is_admin);
    }

    #[test]
    fn representation_never_carries_the_credential() {
        let req = signup(serde_json::json!({ "username": "test_user", "password": "p" }));
        let user = User::from_signup(UserId::new(), &req, "$argon2id$secret".into(), Utc::now()).unwrap();

        let json = serde_json::to_value(user.representation()).unwrap();
        assert!(json.get("password").is_none());
        assert!(json.get("password_hash").is_none());
        assert!(!format!("{user:?}").contains("secret"));
    }
}
