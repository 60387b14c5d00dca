//! Transport-agnostic request gateway.
//!
//! Every operation takes the caller as an explicit [`Subject`], authorizes it
//! against the decision table before touching the store, and reports failures
//! as a [`GatewayError`]. The HTTP layer only maps those onto status codes.

use std::sync::Arc;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use usergate_auth::{
    Action, AdminUserPatch, AuthzError, CredentialHasher, GroupName, NewUser, PermissionName,
    ProfilePatch, Resource, Subject, TokenError, TokenKind, TokenPair, TokenService, User,
    UserRepresentation, authorize, validate_username,
};
use usergate_core::{DomainError, UserId};
use usergate_infra::{
    AssociationManager, CredentialVerifier, GROUP_PERMISSIONS, IdentityStore, StoreError,
    USER_GROUPS, USER_PERMISSIONS,
};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum GatewayError {
    #[error("unauthenticated: {0}")]
    Unauthenticated(String),

    #[error("forbidden: {0}")]
    Forbidden(String),

    #[error("validation error: {0}")]
    Validation(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("integrity violation: {0}")]
    IntegrityViolation(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl From<DomainError> for GatewayError {
    fn from(value: DomainError) -> Self {
        match value {
            DomainError::Unauthenticated => {
                GatewayError::Unauthenticated("authentication required".to_string())
            }
            DomainError::Forbidden(msg) => GatewayError::Forbidden(msg),
            DomainError::Validation(msg) | DomainError::InvalidId(msg) => GatewayError::Validation(msg),
            DomainError::NotFound(msg) => GatewayError::NotFound(msg),
            DomainError::IntegrityViolation(msg) => GatewayError::IntegrityViolation(msg),
        }
    }
}

impl From<StoreError> for GatewayError {
    fn from(value: StoreError) -> Self {
        match value {
            StoreError::Domain(e) => e.into(),
            other => GatewayError::Internal(other.to_string()),
        }
    }
}

impl From<AuthzError> for GatewayError {
    fn from(value: AuthzError) -> Self {
        DomainError::from(value).into()
    }
}

impl From<TokenError> for GatewayError {
    fn from(value: TokenError) -> Self {
        match value {
            TokenError::Signing(msg) => GatewayError::Internal(msg),
            other => GatewayError::Unauthenticated(other.to_string()),
        }
    }
}

pub type GatewayResult<T> = Result<T, GatewayError>;

/// Count plus items, the shape of every list operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Page<T> {
    pub count: usize,
    pub items: Vec<T>,
}

impl<T> Page<T> {
    pub fn map<U>(self, f: impl FnMut(T) -> U) -> Page<U> {
        Page {
            count: self.count,
            items: self.items.into_iter().map(f).collect(),
        }
    }
}

impl<T> From<Vec<T>> for Page<T> {
    fn from(items: Vec<T>) -> Self {
        Self {
            count: items.len(),
            items,
        }
    }
}

#[derive(Clone, Deserialize)]
pub struct PasswordChange {
    /// Current password.
    pub password: String,
    pub password_new: String,
}

impl std::fmt::Debug for PasswordChange {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("PasswordChange { .. }")
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UsernameAvailability {
    pub username: String,
    pub available: bool,
}

pub struct Gateway<S> {
    store: Arc<S>,
    tokens: Arc<dyn TokenService>,
    credentials: CredentialVerifier<Arc<S>>,
    associations: AssociationManager<Arc<S>>,
}

impl<S: IdentityStore> Gateway<S> {
    pub fn new(store: Arc<S>, tokens: Arc<dyn TokenService>, hasher: Arc<dyn CredentialHasher>) -> Self {
        Self {
            credentials: CredentialVerifier::new(Arc::clone(&store), hasher),
            associations: AssociationManager::new(Arc::clone(&store)),
            store,
            tokens,
        }
    }

    // ── session ─────────────────────────────────────────────────────────────

    /// Resolve a bearer token to a subject. Never fails: a missing, invalid
    /// or orphaned token is simply anonymous.
    pub fn authenticate(&self, bearer: Option<&str>) -> Subject {
        let Some(token) = bearer else {
            return Subject::Anonymous;
        };
        let user_id = match self.tokens.resolve(token, TokenKind::Access, Utc::now()) {
            Ok(id) => id,
            Err(e) => {
                tracing::debug!(error = %e, "bearer token rejected");
                return Subject::Anonymous;
            }
        };
        match self.store.read(|dir| Ok(dir.identity(&user_id))) {
            Ok(Some(identity)) => Subject::Authenticated(identity),
            Ok(None) => {
                tracing::debug!(%user_id, "token subject no longer exists");
                Subject::Anonymous
            }
            Err(e) => {
                tracing::warn!(error = %e, "identity lookup failed");
                Subject::Anonymous
            }
        }
    }

    pub fn login(&self, username: &str, password: &str) -> GatewayResult<TokenPair> {
        authorize(&Subject::Anonymous, Action::Create, Resource::Session)?;
        let Some(user_id) = self.credentials.authenticate(username, password)? else {
            tracing::warn!(%username, "login failed");
            return Err(GatewayError::Unauthenticated(
                "invalid username or password".to_string(),
            ));
        };
        let pair = self.tokens.issue(user_id, Utc::now())?;
        tracing::info!(%user_id, "login succeeded");
        Ok(pair)
    }

    pub fn refresh(&self, refresh_token: &str) -> GatewayResult<TokenPair> {
        authorize(&Subject::Anonymous, Action::Create, Resource::Session)?;
        let now = Utc::now();
        let user_id = self.tokens.resolve(refresh_token, TokenKind::Refresh, now)?;
        if !self.store.read(|dir| Ok(dir.has_user(&user_id)))? {
            return Err(GatewayError::Unauthenticated(
                "token subject no longer exists".to_string(),
            ));
        }
        let pair = self.tokens.issue(user_id, now)?;
        tracing::info!(%user_id, "tokens refreshed");
        Ok(pair)
    }

    /// Existing tokens stay valid after a password change.
    pub fn change_password(&self, subject: &Subject, change: &PasswordChange) -> GatewayResult<()> {
        let me = caller(subject)?;
        authorize(subject, Action::Update, Resource::Password(me))?;
        if !self.credentials.verify(&me, &change.password)? {
            tracing::warn!(user_id = %me, "password change with wrong current password");
            return Err(GatewayError::Unauthenticated(
                "current password is incorrect".to_string(),
            ));
        }
        self.credentials.set_password(&me, &change.password_new)?;
        tracing::info!(user_id = %me, "password changed");
        Ok(())
    }

    // ── self service ────────────────────────────────────────────────────────

    pub fn get_self(&self, subject: &Subject) -> GatewayResult<UserRepresentation> {
        let me = caller(subject)?;
        authorize(subject, Action::Retrieve, Resource::Profile(me))?;
        Ok(self
            .store
            .read(|dir| dir.require_user(&me).map(User::representation))?)
    }

    pub fn update_self(&self, subject: &Subject, patch: &ProfilePatch) -> GatewayResult<UserRepresentation> {
        let me = caller(subject)?;
        authorize(subject, Action::Update, Resource::Profile(me))?;
        let user = self
            .store
            .transaction(|dir| dir.update_user(&me, |u| u.apply_profile(patch)))?;
        tracing::info!(user_id = %me, "profile updated");
        Ok(user.representation())
    }

    pub fn list_self_groups(&self, subject: &Subject) -> GatewayResult<Page<GroupName>> {
        let me = caller(subject)?;
        authorize(subject, Action::List, Resource::ProfileGroups(me))?;
        Ok(self.store.read(|dir| USER_GROUPS.list(dir, &me))?.into())
    }

    /// Effective permissions: direct grants plus those of every group.
    pub fn list_self_permissions(&self, subject: &Subject) -> GatewayResult<Page<PermissionName>> {
        let me = caller(subject)?;
        authorize(subject, Action::List, Resource::ProfilePermissions(me))?;
        let permissions = self.store.read(|dir| {
            dir.require_user(&me)?;
            Ok(dir.effective_permissions(&me))
        })?;
        Ok(permissions.into_iter().collect::<Vec<_>>().into())
    }

    // ── users ───────────────────────────────────────────────────────────────

    pub fn signup(&self, subject: &Subject, request: &NewUser) -> GatewayResult<UserRepresentation> {
        authorize(subject, Action::Create, Resource::Users)?;
        request.validate()?;
        let password_hash = self.credentials.hash(&request.password)?;
        let user = User::from_signup(UserId::new(), request, password_hash, Utc::now())?;
        let representation = user.representation();
        self.store.transaction(|dir| dir.insert_user(user))?;
        tracing::info!(
            actor = ?subject.user_id(),
            user_id = %representation.id,
            username = %representation.username,
            "user signed up"
        );
        Ok(representation)
    }

    pub fn check_username(&self, subject: &Subject, username: &str) -> GatewayResult<UsernameAvailability> {
        authorize(subject, Action::Retrieve, Resource::UsernameAvailability)?;
        validate_username(username)?;
        let username = username.trim().to_string();
        let available = self.store.read(|dir| Ok(dir.user_by_username(&username).is_none()))?;
        Ok(UsernameAvailability { username, available })
    }

    pub fn list_users(&self, subject: &Subject) -> GatewayResult<Page<UserRepresentation>> {
        authorize(subject, Action::List, Resource::Users)?;
        let users = self
            .store
            .read(|dir| Ok(dir.users().map(User::representation).collect::<Vec<_>>()))?;
        Ok(users.into())
    }

    pub fn get_user(&self, subject: &Subject, id: &str) -> GatewayResult<UserRepresentation> {
        authorize(subject, Action::Retrieve, Resource::Users)?;
        let id: UserId = id.parse()?;
        Ok(self
            .store
            .read(|dir| dir.require_user(&id).map(User::representation))?)
    }

    pub fn update_user(
        &self,
        subject: &Subject,
        id: &str,
        patch: &AdminUserPatch,
    ) -> GatewayResult<UserRepresentation> {
        authorize(subject, Action::Update, Resource::Users)?;
        let id: UserId = id.parse()?;
        let user = self
            .store
            .transaction(|dir| dir.update_user(&id, |u| u.apply_admin(patch)))?;
        tracing::info!(actor = ?subject.user_id(), user_id = %id, "user updated");
        Ok(user.representation())
    }

    /// Removes the account together with its memberships and direct grants.
    pub fn destroy_user(&self, subject: &Subject, id: &str) -> GatewayResult<()> {
        authorize(subject, Action::Destroy, Resource::Users)?;
        let id: UserId = id.parse()?;
        if subject.user_id() == Some(id) {
            return Err(GatewayError::IntegrityViolation(
                "an administrator cannot destroy their own account".to_string(),
            ));
        }
        self.store.transaction(|dir| dir.remove_user(&id))?;
        tracing::info!(actor = ?subject.user_id(), user_id = %id, "user destroyed");
        Ok(())
    }

    // ── groups ──────────────────────────────────────────────────────────────

    pub fn list_groups(&self, subject: &Subject) -> GatewayResult<Page<GroupName>> {
        authorize(subject, Action::List, Resource::Groups)?;
        let groups = self
            .store
            .read(|dir| Ok(dir.groups().cloned().collect::<Vec<_>>()))?;
        Ok(groups.into())
    }

    pub fn create_group(&self, subject: &Subject, name: &str) -> GatewayResult<GroupName> {
        authorize(subject, Action::Create, Resource::Groups)?;
        let name = GroupName::parse(name)?;
        self.store.transaction(|dir| dir.insert_group(name.clone()))?;
        tracing::info!(actor = ?subject.user_id(), group = %name, "group created");
        Ok(name)
    }

    pub fn get_group(&self, subject: &Subject, name: &str) -> GatewayResult<GroupName> {
        authorize(subject, Action::Retrieve, Resource::Groups)?;
        let name = GroupName::parse(name)?;
        if !self.store.read(|dir| Ok(dir.has_group(&name)))? {
            return Err(GatewayError::NotFound(format!("group '{name}' does not exist")));
        }
        Ok(name)
    }

    pub fn destroy_group(&self, subject: &Subject, name: &str) -> GatewayResult<()> {
        authorize(subject, Action::Destroy, Resource::Groups)?;
        let name = GroupName::parse(name)?;
        self.store.transaction(|dir| dir.remove_group(&name))?;
        tracing::info!(actor = ?subject.user_id(), group = %name, "group destroyed");
        Ok(())
    }

    // ── permissions ─────────────────────────────────────────────────────────

    pub fn list_permissions(&self, subject: &Subject) -> GatewayResult<Page<PermissionName>> {
        authorize(subject, Action::List, Resource::Permissions)?;
        let permissions = self
            .store
            .read(|dir| Ok(dir.permissions().cloned().collect::<Vec<_>>()))?;
        Ok(permissions.into())
    }

    pub fn create_permission(&self, subject: &Subject, name: &str) -> GatewayResult<PermissionName> {
        authorize(subject, Action::Create, Resource::Permissions)?;
        let name = PermissionName::parse(name)?;
        self.store
            .transaction(|dir| dir.insert_permission(name.clone()))?;
        tracing::info!(actor = ?subject.user_id(), permission = %name, "permission created");
        Ok(name)
    }

    pub fn get_permission(&self, subject: &Subject, name: &str) -> GatewayResult<PermissionName> {
        authorize(subject, Action::Retrieve, Resource::Permissions)?;
        let name = PermissionName::parse(name)?;
        if !self.store.read(|dir| Ok(dir.has_permission(&name)))? {
            return Err(GatewayError::NotFound(format!(
                "permission '{name}' does not exist"
            )));
        }
        Ok(name)
    }

    pub fn destroy_permission(&self, subject: &Subject, name: &str) -> GatewayResult<()> {
        authorize(subject, Action::Destroy, Resource::Permissions)?;
        let name = PermissionName::parse(name)?;
        self.store.transaction(|dir| dir.remove_permission(&name))?;
        tracing::info!(actor = ?subject.user_id(), permission = %name, "permission destroyed");
        Ok(())
    }

    // ── relations ───────────────────────────────────────────────────────────
    //
    // Raw identifiers are parsed only after the caller passed the decision
    // table, so a member never learns whether an id is well-formed.

    pub fn list_user_groups(&self, subject: &Subject, user: &str) -> GatewayResult<Page<GroupName>> {
        authorize(subject, Action::List, Resource::UserGroups)?;
        let user: UserId = user.parse()?;
        Ok(self.associations.list(subject, &USER_GROUPS, &user)?.into())
    }

    pub fn add_user_group(&self, subject: &Subject, user: &str, group: &str) -> GatewayResult<GroupName> {
        authorize(subject, Action::Create, Resource::UserGroups)?;
        let user: UserId = user.parse()?;
        let group = GroupName::parse(group)?;
        Ok(self.associations.create(subject, &USER_GROUPS, &user, group)?)
    }

    pub fn remove_user_group(&self, subject: &Subject, user: &str, group: &str) -> GatewayResult<()> {
        authorize(subject, Action::Destroy, Resource::UserGroups)?;
        let user: UserId = user.parse()?;
        let group = GroupName::parse(group)?;
        Ok(self.associations.destroy(subject, &USER_GROUPS, &user, &group)?)
    }

    pub fn list_user_permissions(
        &self,
        subject: &Subject,
        user: &str,
    ) -> GatewayResult<Page<PermissionName>> {
        authorize(subject, Action::List, Resource::UserPermissions)?;
        let user: UserId = user.parse()?;
        Ok(self.associations.list(subject, &USER_PERMISSIONS, &user)?.into())
    }

    pub fn add_user_permission(
        &self,
        subject: &Subject,
        user: &str,
        permission: &str,
    ) -> GatewayResult<PermissionName> {
        authorize(subject, Action::Create, Resource::UserPermissions)?;
        let user: UserId = user.parse()?;
        let permission = PermissionName::parse(permission)?;
        Ok(self
            .associations
            .create(subject, &USER_PERMISSIONS, &user, permission)?)
    }

    pub fn remove_user_permission(
        &self,
        subject: &Subject,
        user: &str,
        permission: &str,
    ) -> GatewayResult<()> {
        authorize(subject, Action::Destroy, Resource::UserPermissions)?;
        let user: UserId = user.parse()?;
        let permission = PermissionName::parse(permission)?;
        Ok(self
            .associations
            .destroy(subject, &USER_PERMISSIONS, &user, &permission)?)
    }

    pub fn list_group_permissions(
        &self,
        subject: &Subject,
        group: &str,
    ) -> GatewayResult<Page<PermissionName>> {
        authorize(subject, Action::List, Resource::GroupPermissions)?;
        let group = GroupName::parse(group)?;
        Ok(self
            .associations
            .list(subject, &GROUP_PERMISSIONS, &group)?
            .into())
    }

    pub fn add_group_permission(
        &self,
        subject: &Subject,
        group: &str,
        permission: &str,
    ) -> GatewayResult<PermissionName> {
        authorize(subject, Action::Create, Resource::GroupPermissions)?;
        let group = GroupName::parse(group)?;
        let permission = PermissionName::parse(permission)?;
        Ok(self
            .associations
            .create(subject, &GROUP_PERMISSIONS, &group, permission)?)
    }

    pub fn remove_group_permission(
        &self,
        subject: &Subject,
        group: &str,
        permission: &str,
    ) -> GatewayResult<()> {
        authorize(subject, Action::Destroy, Resource::GroupPermissions)?;
        let group = GroupName::parse(group)?;
        let permission = PermissionName::parse(permission)?;
        Ok(self
            .associations
            .destroy(subject, &GROUP_PERMISSIONS, &group, &permission)?)
    }
}

fn caller(subject: &Subject) -> GatewayResult<UserId> {
    subject
        .user_id()
        .ok_or_else(|| GatewayError::Unauthenticated("authentication required".to_string()))
}
