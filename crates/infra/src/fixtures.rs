//! Seed data loading.
//!
//! A fixture is a JSON document listing permissions, groups (with their
//! grants) and users (with memberships and direct grants). Loading is
//! idempotent: records that already exist are kept as they are, and links
//! that already exist are skipped.

use std::path::Path;

use chrono::Utc;
use serde::Deserialize;
use usergate_auth::{CredentialHasher, GroupName, PermissionName, SUPERUSER_GROUP, User, validate_username};
use usergate_core::{DomainError, DomainResult, UserId};

use crate::store::{Directory, IdentityStore, StoreError};

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Fixture {
    #[serde(default)]
    pub permissions: Vec<String>,
    #[serde(default)]
    pub groups: Vec<GroupFixture>,
    #[serde(default)]
    pub users: Vec<UserFixture>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GroupFixture {
    pub name: String,
    #[serde(default)]
    pub permissions: Vec<String>,
}

#[derive(Clone, Deserialize)]
pub struct UserFixture {
    #[serde(default)]
    pub id: Option<UserId>,
    pub username: String,
    pub password: String,
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
    #[serde(default)]
    pub realm: String,
    #[serde(default)]
    pub is_admin: bool,
    #[serde(default)]
    pub groups: Vec<String>,
    #[serde(default)]
    pub permissions: Vec<String>,
}

impl core::fmt::Debug for UserFixture {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("UserFixture")
            .field("id", &self.id)
            .field("username", &self.username)
            .field("password", &"[REDACTED]")
            .field("is_admin", &self.is_admin)
            .field("groups", &self.groups)
            .field("permissions", &self.permissions)
            .finish_non_exhaustive()
    }
}

/// How many records a load actually inserted.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FixtureSummary {
    pub permissions: usize,
    pub groups: usize,
    pub users: usize,
    pub links: usize,
}

impl Fixture {
    pub fn from_json(json: &str) -> Result<Self, StoreError> {
        serde_json::from_str(json).map_err(|e| StoreError::Fixture(e.to_string()))
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path)
            .map_err(|e| StoreError::Fixture(format!("{}: {e}", path.display())))?;
        Self::from_json(&json)
    }

    /// Insert everything this fixture describes into `store` in one
    /// transaction. Passwords are hashed before the transaction starts.
    pub fn load_into<S: IdentityStore>(
        &self,
        store: &S,
        hasher: &dyn CredentialHasher,
    ) -> Result<FixtureSummary, StoreError> {
        let mut users = Vec::with_capacity(self.users.len());
        for user in &self.users {
            validate_username(&user.username)?;
            users.push((user, hasher.hash(&user.password)?));
        }

        let summary = store.transaction(|dir| {
            let mut summary = FixtureSummary::default();

            for name in &self.permissions {
                let name = PermissionName::parse(name.as_str())?;
                if !dir.has_permission(&name) {
                    dir.insert_permission(name)?;
                    summary.permissions += 1;
                }
            }

            for group in &self.groups {
                let name = GroupName::parse(group.name.as_str())?;
                if !dir.has_group(&name) {
                    dir.insert_group(name.clone())?;
                    summary.groups += 1;
                }
                for permission in &group.permissions {
                    let permission = existing_permission(dir, permission)?;
                    if dir.group_permissions.insert(name.clone(), permission) {
                        summary.links += 1;
                    }
                }
            }

            for (user, password_hash) in users {
                let id = match dir.user_by_username(user.username.trim()) {
                    Some(existing) => existing.id,
                    None => {
                        let id = user.id.unwrap_or_default();
                        dir.insert_user(User {
                            id,
                            username: user.username.trim().to_string(),
                            password_hash,
                            first_name: user.first_name.clone(),
                            last_name: user.last_name.clone(),
                            realm: user.realm.clone(),
                            is_admin: user.is_admin,
                            date_joined: Utc::now(),
                        })?;
                        summary.users += 1;
                        id
                    }
                };
                for group in &user.groups {
                    let group = GroupName::parse(group.as_str())?;
                    if !dir.has_group(&group) {
                        return Err(DomainError::validation(format!("group '{group}' does not exist")));
                    }
                    if dir.user_groups.insert(id, group) {
                        summary.links += 1;
                    }
                }
                for permission in &user.permissions {
                    let permission = existing_permission(dir, permission)?;
                    if dir.user_permissions.insert(id, permission) {
                        summary.links += 1;
                    }
                }
            }

            Ok(summary)
        })?;

        tracing::info!(
            permissions = summary.permissions,
            groups = summary.groups,
            users = summary.users,
            links = summary.links,
            "fixture loaded"
        );
        Ok(summary)
    }
}

fn existing_permission(dir: &Directory, name: &str) -> DomainResult<PermissionName> {
    let name = PermissionName::parse(name)?;
    if dir.has_permission(&name) {
        Ok(name)
    } else {
        Err(DomainError::validation(format!("permission '{name}' does not exist")))
    }
}

/// Make sure an administrator named `username` exists and belongs to the
/// superuser group. An existing account keeps its password.
pub fn bootstrap_admin<S: IdentityStore>(
    store: &S,
    hasher: &dyn CredentialHasher,
    username: &str,
    password: &str,
) -> Result<UserId, StoreError> {
    validate_username(username)?;
    if password.is_empty() {
        return Err(DomainError::validation("password cannot be empty").into());
    }
    let password_hash = hasher.hash(password)?;
    let id = store.transaction(|dir| {
        let id = match dir.user_by_username(username.trim()) {
            Some(existing) => {
                let id = existing.id;
                dir.update_user(&id, |u| u.is_admin = true)?;
                id
            }
            None => {
                let id = UserId::new();
                dir.insert_user(User {
                    id,
                    username: username.trim().to_string(),
                    password_hash,
                    first_name: String::new(),
                    last_name: String::new(),
                    realm: String::new(),
                    is_admin: true,
                    date_joined: Utc::now(),
                })?;
                id
            }
        };
        dir.user_groups.insert(id, SUPERUSER_GROUP);
        Ok(id)
    })?;
    tracing::info!(user_id = %id, %username, "bootstrap administrator ready");
    Ok(id)
}

#[cfg(test)]
mod tests {
    use usergate_auth::{ADMIN_PERMISSION, Argon2Hasher, PasswordPolicy};

    use super::*;
    use crate::store::InMemoryIdentityStore;

    const TEST_USERS: &str = include_str!("../../../fixtures/test_users.json");

    fn hasher() -> Argon2Hasher {
        Argon2Hasher::new(PasswordPolicy::minimal())
    }

    fn test_user() -> UserId {
        "cd927db8-3115-11ea-bbc8-a86bad54c153".parse().unwrap()
    }

    #[test]
    fn loads_the_shared_test_fixture() {
        let store = InMemoryIdentityStore::new();
        let fixture = Fixture::from_json(TEST_USERS).unwrap();
        fixture.load_into(&store, &hasher()).unwrap();

        store
            .read(|dir| {
                assert_eq!(dir.user_count(), 3);
                assert_eq!(dir.groups().count(), 3);
                assert_eq!(dir.permissions().count(), 13);

                let user = test_user();
                assert_eq!(dir.groups_of(&user).count(), 1);
                assert_eq!(dir.direct_permissions_of(&user).count(), 1);
                assert_eq!(dir.effective_permissions(&user).len(), 2);

                let admin = dir.user_by_username("test_admin").unwrap();
                assert!(dir.identity(&admin.id).unwrap().is_admin());
                assert!(dir.effective_permissions(&admin.id).contains(&ADMIN_PERMISSION));
                Ok(())
            })
            .unwrap();
    }

    #[test]
    fn loading_twice_inserts_nothing_new() {
        let store = InMemoryIdentityStore::new();
        let fixture = Fixture::from_json(TEST_USERS).unwrap();
        let first = fixture.load_into(&store, &hasher()).unwrap();
        assert!(first.users > 0);

        let second = fixture.load_into(&store, &hasher()).unwrap();
        assert_eq!(second, FixtureSummary::default());
    }

    #[test]
    fn dangling_references_roll_back_the_whole_load() {
        let store = InMemoryIdentityStore::new();
        let fixture = Fixture::from_json(
            r#"{
                "permissions": ["test.permission"],
                "users": [{"username": "someone", "password": "x", "groups": ["missing"]}]
            }"#,
        )
        .unwrap();

        let err = fixture.load_into(&store, &hasher()).unwrap_err();
        assert!(matches!(err, StoreError::Domain(DomainError::Validation(_))));
        store
            .read(|dir| {
                assert_eq!(dir.user_count(), 0);
                assert!(!dir.has_permission(&PermissionName::parse("test.permission")?));
                Ok(())
            })
            .unwrap();
    }

    #[test]
    fn malformed_json_is_a_fixture_error() {
        assert!(matches!(Fixture::from_json("{"), Err(StoreError::Fixture(_))));
    }

    #[test]
    fn bootstrap_admin_is_idempotent() {
        let store = InMemoryIdentityStore::new();
        let first = bootstrap_admin(&store, &hasher(), "root", "secret").unwrap();
        let second = bootstrap_admin(&store, &hasher(), "root", "other").unwrap();
        assert_eq!(first, second);

        store
            .read(|dir| {
                assert_eq!(dir.user_count(), 1);
                assert!(dir.groups_of(&first).any(|g| *g == SUPERUSER_GROUP));
                Ok(())
            })
            .unwrap();
    }
}
