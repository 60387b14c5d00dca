//! Many-to-many relations between users, groups and permissions.
//!
//! The three relations (user→group, user→permission, group→permission) share
//! one state machine per `(owner, target)` pair:
//!
//! ```text
//!            create                       destroy
//!   ABSENT ─────────▶ PRESENT      PRESENT ─────────▶ ABSENT
//! ```
//!
//! - `create` on a missing target fails validation ("does not exist");
//! - `create` on a present pair fails validation ("already has"), it is not
//!   an upsert;
//! - `destroy` of a protected target is an integrity violation;
//! - `destroy` of an absent pair is not-found.
//!
//! [`Association`] holds the per-relation lookups; [`AssociationManager`]
//! adds authorization and runs each operation in one store transaction.

use std::fmt::Display;

use usergate_auth::{
    Action, GroupName, PermissionName, Protected, Resource, Subject, authorize, ensure_destroyable,
};
use usergate_core::{DomainError, DomainResult, UserId};

use crate::store::{Directory, IdentityStore, LinkSet, StoreError};

/// Generic relation engine, parameterized by lookup functions.
pub struct Association<O: 'static, T: 'static> {
    resource: Resource,
    owner_kind: &'static str,
    owner_exists: fn(&Directory, &O) -> bool,
    target_exists: fn(&Directory, &T) -> bool,
    links: fn(&Directory) -> &LinkSet<O, T>,
    links_mut: fn(&mut Directory) -> &mut LinkSet<O, T>,
}

/// Group memberships of a user.
pub const USER_GROUPS: Association<UserId, GroupName> = Association {
    resource: Resource::UserGroups,
    owner_kind: "user",
    owner_exists: user_exists,
    target_exists: group_exists,
    links: user_group_links,
    links_mut: user_group_links_mut,
};

/// Direct permission grants of a user.
pub const USER_PERMISSIONS: Association<UserId, PermissionName> = Association {
    resource: Resource::UserPermissions,
    owner_kind: "user",
    owner_exists: user_exists,
    target_exists: permission_exists,
    links: user_permission_links,
    links_mut: user_permission_links_mut,
};

/// Permission grants of a group.
pub const GROUP_PERMISSIONS: Association<GroupName, PermissionName> = Association {
    resource: Resource::GroupPermissions,
    owner_kind: "group",
    owner_exists: group_exists,
    target_exists: permission_exists,
    links: group_permission_links,
    links_mut: group_permission_links_mut,
};

fn user_exists(dir: &Directory, id: &UserId) -> bool {
    dir.has_user(id)
}

fn group_exists(dir: &Directory, name: &GroupName) -> bool {
    dir.has_group(name)
}

fn permission_exists(dir: &Directory, name: &PermissionName) -> bool {
    dir.has_permission(name)
}

fn user_group_links(dir: &Directory) -> &LinkSet<UserId, GroupName> {
    &dir.user_groups
}

fn user_group_links_mut(dir: &mut Directory) -> &mut LinkSet<UserId, GroupName> {
    &mut dir.user_groups
}

fn user_permission_links(dir: &Directory) -> &LinkSet<UserId, PermissionName> {
    &dir.user_permissions
}

fn user_permission_links_mut(dir: &mut Directory) -> &mut LinkSet<UserId, PermissionName> {
    &mut dir.user_permissions
}

fn group_permission_links(dir: &Directory) -> &LinkSet<GroupName, PermissionName> {
    &dir.group_permissions
}

fn group_permission_links_mut(dir: &mut Directory) -> &mut LinkSet<GroupName, PermissionName> {
    &mut dir.group_permissions
}

impl<O, T> Association<O, T>
where
    O: Ord + Clone + Display,
    T: Ord + Clone + Protected,
{
    pub fn resource(&self) -> Resource {
        self.resource
    }

    fn ensure_owner(&self, dir: &Directory, owner: &O) -> DomainResult<()> {
        if (self.owner_exists)(dir, owner) {
            Ok(())
        } else {
            Err(DomainError::not_found(format!("{} {owner} does not exist", self.owner_kind)))
        }
    }

    /// Current targets of `owner`, ordered.
    pub fn list(&self, dir: &Directory, owner: &O) -> DomainResult<Vec<T>> {
        self.ensure_owner(dir, owner)?;
        Ok((self.links)(dir).targets(owner).cloned().collect())
    }

    pub fn create(&self, dir: &mut Directory, owner: &O, target: T) -> DomainResult<T> {
        self.ensure_owner(dir, owner)?;
        if !(self.target_exists)(dir, &target) {
            return Err(DomainError::validation(format!(
                "{} '{target}' does not exist",
                T::KIND
            )));
        }
        if !(self.links_mut)(dir).insert(owner.clone(), target.clone()) {
            return Err(DomainError::validation(format!(
                "{} {owner} already has {} '{target}'",
                self.owner_kind,
                T::KIND
            )));
        }
        Ok(target)
    }

    pub fn destroy(&self, dir: &mut Directory, owner: &O, target: &T) -> DomainResult<()> {
        ensure_destroyable(target)?;
        self.ensure_owner(dir, owner)?;
        if !(self.links_mut)(dir).remove(owner, target) {
            return Err(DomainError::not_found(format!(
                "{} {owner} does not have {} '{target}'",
                self.owner_kind,
                T::KIND
            )));
        }
        Ok(())
    }
}

/// Authorized, transactional front of the relation engine.
pub struct AssociationManager<S> {
    store: S,
}

impl<S: IdentityStore> AssociationManager<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    pub fn list<O, T>(
        &self,
        subject: &Subject,
        relation: &Association<O, T>,
        owner: &O,
    ) -> Result<Vec<T>, StoreError>
    where
        O: Ord + Clone + Display,
        T: Ord + Clone + Protected,
    {
        authorize(subject, Action::List, relation.resource())?;
        self.store.read(|dir| relation.list(dir, owner))
    }

    pub fn create<O, T>(
        &self,
        subject: &Subject,
        relation: &Association<O, T>,
        owner: &O,
        target: T,
    ) -> Result<T, StoreError>
    where
        O: Ord + Clone + Display,
        T: Ord + Clone + Protected,
    {
        authorize(subject, Action::Create, relation.resource())?;
        let created = self.store.transaction(|dir| relation.create(dir, owner, target))?;
        tracing::info!(
            actor = ?subject.user_id(),
            relation = %relation.resource(),
            %owner,
            target = %created,
            "relation created"
        );
        Ok(created)
    }

    pub fn destroy<O, T>(
        &self,
        subject: &Subject,
        relation: &Association<O, T>,
        owner: &O,
        target: &T,
    ) -> Result<(), StoreError>
    where
        O: Ord + Clone + Display,
        T: Ord + Clone + Protected,
    {
        authorize(subject, Action::Destroy, relation.resource())?;
        self.store.transaction(|dir| relation.destroy(dir, owner, target))?;
        tracing::info!(
            actor = ?subject.user_id(),
            relation = %relation.resource(),
            %owner,
            %target,
            "relation destroyed"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;
    use std::sync::Arc;

    use chrono::Utc;
    use proptest::prelude::*;
    use usergate_auth::{ADMIN_PERMISSION, Identity, Role, SUPERUSER_GROUP, User};

    use super::*;
    use crate::store::InMemoryIdentityStore;

    struct Fixture {
        manager: AssociationManager<Arc<InMemoryIdentityStore>>,
        store: Arc<InMemoryIdentityStore>,
        user: UserId,
        admin: Subject,
        member: Subject,
    }

    fn subject(role: Role) -> Subject {
        Subject::from(Identity {
            user_id: UserId::new(),
            username: "caller".into(),
            role,
            permissions: BTreeSet::new(),
        })
    }

    fn fixture() -> Fixture {
        let store = Arc::new(InMemoryIdentityStore::new());
        let user = UserId::new();
        store
            .transaction(|dir| {
                dir.insert_user(User {
                    id: user,
                    username: "test_user".into(),
                    password_hash: String::new(),
                    first_name: String::new(),
                    last_name: String::new(),
                    realm: String::new(),
                    is_admin: false,
                    date_joined: Utc::now(),
                })?;
                dir.insert_group(group("test_group"))?;
                dir.insert_group(group("test_group_1"))?;
                for p in ["test.permission", "test.permission_1", "test.permission_2"] {
                    dir.insert_permission(perm(p))?;
                }
                Ok(())
            })
            .unwrap();
        Fixture {
            manager: AssociationManager::new(Arc::clone(&store)),
            store,
            user,
            admin: subject(Role::Admin),
            member: subject(Role::Member),
        }
    }

    fn group(name: &str) -> GroupName {
        GroupName::parse(name).unwrap()
    }

    fn perm(name: &str) -> PermissionName {
        PermissionName::parse(name).unwrap()
    }

    #[test]
    fn create_list_destroy_round_trip() {
        let f = fixture();
        let before = f.manager.list(&f.admin, &USER_PERMISSIONS, &f.user).unwrap().len();

        f.manager
            .create(&f.admin, &USER_PERMISSIONS, &f.user, perm("test.permission"))
            .unwrap();
        assert_eq!(
            f.manager.list(&f.admin, &USER_PERMISSIONS, &f.user).unwrap().len(),
            before + 1
        );

        f.manager
            .destroy(&f.admin, &USER_PERMISSIONS, &f.user, &perm("test.permission"))
            .unwrap();
        assert_eq!(
            f.manager.list(&f.admin, &USER_PERMISSIONS, &f.user).unwrap().len(),
            before
        );
    }

    #[test]
    fn duplicate_create_is_a_validation_failure() {
        let f = fixture();
        f.manager
            .create(&f.admin, &USER_GROUPS, &f.user, group("test_group"))
            .unwrap();
        let err = f
            .manager
            .create(&f.admin, &USER_GROUPS, &f.user, group("test_group"))
            .unwrap_err();
        assert!(matches!(err, StoreError::Domain(DomainError::Validation(msg)) if msg.contains("already has")));
    }

    #[test]
    fn missing_target_is_a_validation_failure() {
        let f = fixture();
        let err = f
            .manager
            .create(&f.admin, &USER_PERMISSIONS, &f.user, perm("test.permission_not_existing"))
            .unwrap_err();
        assert!(matches!(err, StoreError::Domain(DomainError::Validation(msg)) if msg.contains("does not exist")));
    }

    #[test]
    fn missing_owner_is_not_found() {
        let f = fixture();
        let err = f
            .manager
            .list(&f.admin, &GROUP_PERMISSIONS, &group("no_such_group"))
            .unwrap_err();
        assert!(matches!(err, StoreError::Domain(DomainError::NotFound(_))));
    }

    #[test]
    fn destroying_an_absent_relation_is_not_found() {
        let f = fixture();
        let err = f
            .manager
            .destroy(&f.admin, &GROUP_PERMISSIONS, &group("test_group_1"), &perm("test.permission"))
            .unwrap_err();
        assert!(matches!(err, StoreError::Domain(DomainError::NotFound(_))));
    }

    #[test]
    fn protected_targets_cannot_be_detached() {
        let f = fixture();
        f.manager
            .create(&f.admin, &USER_GROUPS, &f.user, SUPERUSER_GROUP)
            .unwrap();

        let err = f
            .manager
            .destroy(&f.admin, &USER_GROUPS, &f.user, &SUPERUSER_GROUP)
            .unwrap_err();
        assert!(matches!(err, StoreError::Domain(DomainError::IntegrityViolation(_))));

        let err = f
            .manager
            .destroy(&f.admin, &GROUP_PERMISSIONS, &SUPERUSER_GROUP, &ADMIN_PERMISSION)
            .unwrap_err();
        assert!(matches!(err, StoreError::Domain(DomainError::IntegrityViolation(_))));
    }

    #[test]
    fn members_are_denied_before_any_lookup() {
        let f = fixture();
        let ghost = UserId::new();
        for err in [
            f.manager.list(&f.member, &USER_GROUPS, &ghost).unwrap_err(),
            f.manager
                .create(&f.member, &USER_GROUPS, &ghost, group("nope"))
                .unwrap_err(),
            f.manager
                .destroy(&f.member, &USER_GROUPS, &ghost, &SUPERUSER_GROUP)
                .unwrap_err(),
        ] {
            assert!(matches!(err, StoreError::Domain(DomainError::Forbidden(_))));
        }
        assert!(matches!(
            f.manager.list(&Subject::Anonymous, &USER_GROUPS, &f.user),
            Err(StoreError::Domain(DomainError::Unauthenticated))
        ));
    }

    #[test]
    fn group_membership_changes_effective_permissions_immediately() {
        let f = fixture();
        f.manager
            .create(&f.admin, &GROUP_PERMISSIONS, &group("test_group_1"), perm("test.permission_2"))
            .unwrap();
        let effective = |store: &InMemoryIdentityStore| {
            store.read(|dir| Ok(dir.effective_permissions(&f.user))).unwrap()
        };
        assert!(effective(&f.store).is_empty());

        f.manager
            .create(&f.admin, &USER_GROUPS, &f.user, group("test_group_1"))
            .unwrap();
        assert!(effective(&f.store).contains(&perm("test.permission_2")));

        f.manager
            .destroy(&f.admin, &USER_GROUPS, &f.user, &group("test_group_1"))
            .unwrap();
        assert!(effective(&f.store).is_empty());
    }

    proptest! {
        /// Any sequence of creates and destroys leaves the listed set equal
        /// to a model set, and rejected operations change nothing.
        #[test]
        fn listing_tracks_the_present_set(ops in prop::collection::vec((any::<bool>(), 0usize..3), 1..24)) {
            let f = fixture();
            let names = ["test.permission", "test.permission_1", "test.permission_2"];
            let mut model = BTreeSet::new();

            for (create, idx) in ops {
                let p = perm(names[idx]);
                if create {
                    let result = f.manager.create(&f.admin, &USER_PERMISSIONS, &f.user, p.clone());
                    prop_assert_eq!(result.is_ok(), model.insert(p));
                } else {
                    let result = f.manager.destroy(&f.admin, &USER_PERMISSIONS, &f.user, &p);
                    prop_assert_eq!(result.is_ok(), model.remove(&p));
                }
                let listed: BTreeSet<_> = f.manager
                    .list(&f.admin, &USER_PERMISSIONS, &f.user)
                    .unwrap()
                    .into_iter()
                    .collect();
                prop_assert_eq!(&listed, &model);
            }
        }
    }
}
