//! In-memory shape of the identity data: three entity tables and three
//! many-to-many link tables.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use usergate_auth::{
    ADMIN_PERMISSION, GroupName, Identity, PermissionName, Role, SUPERUSER_GROUP, User,
    effective_permissions, ensure_destroyable,
};
use usergate_core::{DomainError, DomainResult, UserId};

/// Set of `(owner, target)` pairs, indexed by owner.
///
/// Shared on clone; the first mutation of a clone copies the table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkSet<O, T> {
    by_owner: Arc<BTreeMap<O, BTreeSet<T>>>,
}

impl<O, T> Default for LinkSet<O, T> {
    fn default() -> Self {
        Self {
            by_owner: Arc::new(BTreeMap::new()),
        }
    }
}

impl<O: Ord + Clone, T: Ord + Clone> LinkSet<O, T> {
    /// Returns `false` if the pair was already present.
    pub fn insert(&mut self, owner: O, target: T) -> bool {
        if self.by_owner.get(&owner).is_some_and(|targets| targets.contains(&target)) {
            return false;
        }
        Arc::make_mut(&mut self.by_owner)
            .entry(owner)
            .or_default()
            .insert(target)
    }

    /// Returns `false` if the pair was absent.
    pub fn remove(&mut self, owner: &O, target: &T) -> bool {
        if !self.by_owner.get(owner).is_some_and(|targets| targets.contains(target)) {
            return false;
        }
        let by_owner = Arc::make_mut(&mut self.by_owner);
        let Some(targets) = by_owner.get_mut(owner) else {
            return false;
        };
        let removed = targets.remove(target);
        if targets.is_empty() {
            by_owner.remove(owner);
        }
        removed
    }

    pub fn targets<'a>(&'a self, owner: &O) -> impl Iterator<Item = &'a T> + 'a {
        self.by_owner.get(owner).into_iter().flatten()
    }

    pub fn count(&self, owner: &O) -> usize {
        self.by_owner.get(owner).map_or(0, BTreeSet::len)
    }

    pub fn remove_owner(&mut self, owner: &O) {
        if self.by_owner.contains_key(owner) {
            Arc::make_mut(&mut self.by_owner).remove(owner);
        }
    }

    pub fn remove_target(&mut self, target: &T) {
        if !self.by_owner.values().any(|targets| targets.contains(target)) {
            return;
        }
        Arc::make_mut(&mut self.by_owner).retain(|_, targets| {
            targets.remove(target);
            !targets.is_empty()
        });
    }
}

/// Users, groups, permissions and the relations between them.
///
/// # Invariants
/// - usernames, group names and permission names are unique;
/// - every link refers to records that exist (destroying a record removes
///   its links);
/// - the protected group `superuser` and permission `users.admin` always
///   exist.
///
/// Every table sits behind an `Arc`: cloning a directory is cheap and a
/// write copies only the tables it changes.
#[derive(Debug, Clone)]
pub struct Directory {
    users: Arc<BTreeMap<UserId, User>>,
    usernames: Arc<BTreeMap<String, UserId>>,
    groups: Arc<BTreeSet<GroupName>>,
    permissions: Arc<BTreeSet<PermissionName>>,
    pub(crate) user_groups: LinkSet<UserId, GroupName>,
    pub(crate) user_permissions: LinkSet<UserId, PermissionName>,
    pub(crate) group_permissions: LinkSet<GroupName, PermissionName>,
}

impl Default for Directory {
    fn default() -> Self {
        Self::new()
    }
}

impl Directory {
    /// A directory holding only the protected records.
    pub fn new() -> Self {
        let mut directory = Self {
            users: Arc::default(),
            usernames: Arc::default(),
            groups: Arc::new(BTreeSet::from([SUPERUSER_GROUP])),
            permissions: Arc::new(BTreeSet::from([ADMIN_PERMISSION])),
            user_groups: LinkSet::default(),
            user_permissions: LinkSet::default(),
            group_permissions: LinkSet::default(),
        };
        directory
            .group_permissions
            .insert(SUPERUSER_GROUP, ADMIN_PERMISSION);
        directory
    }

    // ─────────────────────────────────────────────────────────────────────
    // Users
    // ─────────────────────────────────────────────────────────────────────

    /// All users, ordered by username.
    pub fn users(&self) -> impl Iterator<Item = &User> + '_ {
        self.usernames.values().filter_map(|id| self.users.get(id))
    }

    pub fn user_count(&self) -> usize {
        self.users.len()
    }

    pub fn user(&self, id: &UserId) -> Option<&User> {
        self.users.get(id)
    }

    pub fn user_by_username(&self, username: &str) -> Option<&User> {
        self.usernames
            .get(username.trim())
            .and_then(|id| self.users.get(id))
    }

    pub fn require_user(&self, id: &UserId) -> DomainResult<&User> {
        self.user(id)
            .ok_or_else(|| DomainError::not_found(format!("user {id} does not exist")))
    }

    pub fn has_user(&self, id: &UserId) -> bool {
        self.users.contains_key(id)
    }

    pub fn insert_user(&mut self, user: User) -> DomainResult<()> {
        if self.usernames.contains_key(&user.username) {
            return Err(DomainError::validation(format!(
                "a user with username '{}' already exists",
                user.username
            )));
        }
        if self.users.contains_key(&user.id) {
            return Err(DomainError::validation(format!("user id {} is already taken", user.id)));
        }
        Arc::make_mut(&mut self.usernames).insert(user.username.clone(), user.id);
        Arc::make_mut(&mut self.users).insert(user.id, user);
        Ok(())
    }

    /// Mutate a user in place. A changed username is re-indexed and must
    /// stay unique.
    pub fn update_user(&mut self, id: &UserId, f: impl FnOnce(&mut User)) -> DomainResult<User> {
        let current = self.require_user(id)?.clone();
        let mut updated = current.clone();
        f(&mut updated);
        updated.id = current.id;

        if updated.username != current.username {
            if self.usernames.contains_key(&updated.username) {
                return Err(DomainError::validation(format!(
                    "a user with username '{}' already exists",
                    updated.username
                )));
            }
            let usernames = Arc::make_mut(&mut self.usernames);
            usernames.remove(&current.username);
            usernames.insert(updated.username.clone(), updated.id);
        }
        Arc::make_mut(&mut self.users).insert(updated.id, updated.clone());
        Ok(updated)
    }

    /// Remove a user and every membership and direct grant it owns.
    pub fn remove_user(&mut self, id: &UserId) -> DomainResult<User> {
        self.require_user(id)?;
        let user = Arc::make_mut(&mut self.users)
            .remove(id)
            .ok_or_else(|| DomainError::not_found(format!("user {id} does not exist")))?;
        Arc::make_mut(&mut self.usernames).remove(&user.username);
        self.user_groups.remove_owner(id);
        self.user_permissions.remove_owner(id);
        Ok(user)
    }

    // ─────────────────────────────────────────────────────────────────────
    // Groups
    // ─────────────────────────────────────────────────────────────────────

    pub fn groups(&self) -> impl Iterator<Item = &GroupName> + '_ {
        self.groups.iter()
    }

    pub fn has_group(&self, name: &GroupName) -> bool {
        self.groups.contains(name)
    }

    pub fn insert_group(&mut self, name: GroupName) -> DomainResult<()> {
        if self.groups.contains(&name) {
            return Err(DomainError::validation(format!("group '{name}' already exists")));
        }
        Arc::make_mut(&mut self.groups).insert(name);
        Ok(())
    }

    /// Destroy a group with its memberships and grants. Protected groups are
    /// refused before the existence check.
    pub fn remove_group(&mut self, name: &GroupName) -> DomainResult<()> {
        ensure_destroyable(name)?;
        if !self.groups.contains(name) {
            return Err(DomainError::not_found(format!("group '{name}' does not exist")));
        }
        Arc::make_mut(&mut self.groups).remove(name);
        self.user_groups.remove_target(name);
        self.group_permissions.remove_owner(name);
        Ok(())
    }

    // ─────────────────────────────────────────────────────────────────────
    // Permissions
    // ─────────────────────────────────────────────────────────────────────

    pub fn permissions(&self) -> impl Iterator<Item = &PermissionName> + '_ {
        self.permissions.iter()
    }

    pub fn has_permission(&self, name: &PermissionName) -> bool {
        self.permissions.contains(name)
    }

    pub fn insert_permission(&mut self, name: PermissionName) -> DomainResult<()> {
        if self.permissions.contains(&name) {
            return Err(DomainError::validation(format!("permission '{name}' already exists")));
        }
        Arc::make_mut(&mut self.permissions).insert(name);
        Ok(())
    }

    /// Destroy a permission and every user and group grant of it.
    pub fn remove_permission(&mut self, name: &PermissionName) -> DomainResult<()> {
        ensure_destroyable(name)?;
        if !self.permissions.contains(name) {
            return Err(DomainError::not_found(format!("permission '{name}' does not exist")));
        }
        Arc::make_mut(&mut self.permissions).remove(name);
        self.user_permissions.remove_target(name);
        self.group_permissions.remove_target(name);
        Ok(())
    }

    // ─────────────────────────────────────────────────────────────────────
    // Resolution
    // ─────────────────────────────────────────────────────────────────────

    pub fn groups_of(&self, user: &UserId) -> impl Iterator<Item = &GroupName> + '_ {
        self.user_groups.targets(user)
    }

    pub fn direct_permissions_of(&self, user: &UserId) -> impl Iterator<Item = &PermissionName> + '_ {
        self.user_permissions.targets(user)
    }

    pub fn permissions_of_group(&self, group: &GroupName) -> impl Iterator<Item = &PermissionName> + '_ {
        self.group_permissions.targets(group)
    }

    /// Direct grants ∪ grants of every group the user belongs to.
    pub fn effective_permissions(&self, user: &UserId) -> BTreeSet<PermissionName> {
        let via_groups = self
            .groups_of(user)
            .flat_map(|group| self.permissions_of_group(group));
        effective_permissions(self.direct_permissions_of(user), via_groups)
    }

    /// Resolve a stored account into a request identity.
    pub fn identity(&self, id: &UserId) -> Option<Identity> {
        let user = self.user(id)?;
        let permissions = self.effective_permissions(id);
        Some(Identity {
            user_id: user.id,
            username: user.username.clone(),
            role: Role::derive(user.is_admin, &permissions),
            permissions,
        })
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::*;

    fn user(name: &str) -> User {
        User {
            id: UserId::new(),
            username: name.to_string(),
            password_hash: String::new(),
            first_name: String::new(),
            last_name: String::new(),
            realm: String::new(),
            is_admin: false,
            date_joined: Utc::now(),
        }
    }

    fn perm(name: &str) -> PermissionName {
        PermissionName::parse(name).unwrap()
    }

    fn group(name: &str) -> GroupName {
        GroupName::parse(name).unwrap()
    }

    #[test]
    fn fresh_directory_holds_protected_records() {
        let dir = Directory::new();
        assert!(dir.has_group(&SUPERUSER_GROUP));
        assert!(dir.has_permission(&ADMIN_PERMISSION));
        assert_eq!(dir.permissions_of_group(&SUPERUSER_GROUP).count(), 1);
    }

    #[test]
    fn usernames_are_unique() {
        let mut dir = Directory::new();
        dir.insert_user(user("test_user")).unwrap();
        let err = dir.insert_user(user("test_user")).unwrap_err();
        assert!(matches!(err, DomainError::Validation(msg) if msg.contains("already exists")));
        assert_eq!(dir.user_count(), 1);
    }

    #[test]
    fn users_are_listed_by_username() {
        let mut dir = Directory::new();
        for name in ["carol", "alice", "bob"] {
            dir.insert_user(user(name)).unwrap();
        }
        let names: Vec<_> = dir.users().map(|u| u.username.as_str()).collect();
        assert_eq!(names, ["alice", "bob", "carol"]);
    }

    #[test]
    fn renaming_reindexes_the_username() {
        let mut dir = Directory::new();
        let u = user("old");
        let id = u.id;
        dir.insert_user(u).unwrap();
        dir.insert_user(user("taken")).unwrap();

        assert!(dir.update_user(&id, |u| u.username = "taken".into()).is_err());
        dir.update_user(&id, |u| u.username = "new".into()).unwrap();
        assert!(dir.user_by_username("old").is_none());
        assert_eq!(dir.user_by_username("new").unwrap().id, id);
    }

    #[test]
    fn effective_permissions_follow_membership() {
        let mut dir = Directory::new();
        let u = user("test_user");
        let id = u.id;
        dir.insert_user(u).unwrap();
        dir.insert_group(group("test_group_1")).unwrap();
        dir.insert_permission(perm("test.permission_1")).unwrap();
        dir.insert_permission(perm("test.permission_2")).unwrap();
        dir.user_permissions.insert(id, perm("test.permission_1"));
        dir.group_permissions.insert(group("test_group_1"), perm("test.permission_2"));

        assert_eq!(dir.effective_permissions(&id).len(), 1);

        dir.user_groups.insert(id, group("test_group_1"));
        let effective = dir.effective_permissions(&id);
        assert_eq!(effective.len(), 2);
        assert!(effective.contains(&perm("test.permission_2")));

        dir.user_groups.remove(&id, &group("test_group_1"));
        assert_eq!(dir.effective_permissions(&id).len(), 1);
    }

    #[test]
    fn superuser_membership_confers_admin() {
        let mut dir = Directory::new();
        let u = user("promoted");
        let id = u.id;
        dir.insert_user(u).unwrap();
        assert_eq!(dir.identity(&id).unwrap().role, Role::Member);

        dir.user_groups.insert(id, SUPERUSER_GROUP);
        let identity = dir.identity(&id).unwrap();
        assert_eq!(identity.role, Role::Admin);
        assert!(identity.permissions.contains(&ADMIN_PERMISSION));
    }

    #[test]
    fn destroying_records_cascades_links() {
        let mut dir = Directory::new();
        let u = user("test_user");
        let id = u.id;
        dir.insert_user(u).unwrap();
        dir.insert_group(group("test_group")).unwrap();
        dir.insert_permission(perm("test.permission")).unwrap();
        dir.user_groups.insert(id, group("test_group"));
        dir.user_permissions.insert(id, perm("test.permission"));
        dir.group_permissions.insert(group("test_group"), perm("test.permission"));

        dir.remove_permission(&perm("test.permission")).unwrap();
        assert_eq!(dir.direct_permissions_of(&id).count(), 0);
        assert_eq!(dir.permissions_of_group(&group("test_group")).count(), 0);

        dir.remove_group(&group("test_group")).unwrap();
        assert_eq!(dir.groups_of(&id).count(), 0);

        dir.user_groups.insert(id, SUPERUSER_GROUP);
        dir.remove_user(&id).unwrap();
        assert_eq!(dir.user_groups.count(&id), 0);
        assert!(dir.user_by_username("test_user").is_none());
    }

    #[test]
    fn protected_records_cannot_be_destroyed() {
        let mut dir = Directory::new();
        assert!(matches!(
            dir.remove_group(&SUPERUSER_GROUP),
            Err(DomainError::IntegrityViolation(_))
        ));
        assert!(matches!(
            dir.remove_permission(&ADMIN_PERMISSION),
            Err(DomainError::IntegrityViolation(_))
        ));
        assert!(matches!(
            dir.remove_group(&group("missing")),
            Err(DomainError::NotFound(_))
        ));
    }

    #[test]
    fn a_write_copies_only_the_tables_it_touches() {
        let mut dir = Directory::new();
        let u = user("test_user");
        let id = u.id;
        dir.insert_user(u).unwrap();

        let mut staged = dir.clone();
        staged.user_groups.insert(id, SUPERUSER_GROUP);

        assert!(Arc::ptr_eq(&dir.users, &staged.users));
        assert!(Arc::ptr_eq(&dir.groups, &staged.groups));
        assert!(Arc::ptr_eq(&dir.user_permissions.by_owner, &staged.user_permissions.by_owner));
        assert!(!Arc::ptr_eq(&dir.user_groups.by_owner, &staged.user_groups.by_owner));
        assert_eq!(dir.user_groups.count(&id), 0);
        assert_eq!(staged.user_groups.count(&id), 1);

        assert!(!staged.user_groups.insert(id, SUPERUSER_GROUP));
        let shared = staged.clone();
        assert!(!staged.user_groups.remove(&id, &group("absent")));
        assert!(Arc::ptr_eq(&shared.user_groups.by_owner, &staged.user_groups.by_owner));
    }
}
