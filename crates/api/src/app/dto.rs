use std::fmt::Display;

use axum::{Json, http::StatusCode, response::IntoResponse};
use serde::{Deserialize, Serialize};

use usergate_auth::{Action, Resource, Subject, authorize};
use usergate_core::UserId;

use crate::app::errors;
use crate::gateway::{GatewayError, GatewayResult, Page};

// -------------------------
// Request DTOs
// -------------------------

#[derive(Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

impl std::fmt::Debug for LoginRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoginRequest")
            .field("username", &self.username)
            .finish_non_exhaustive()
    }
}

#[derive(Deserialize)]
pub struct RefreshRequest {
    pub refresh: String,
}

/// Body of every create call that names a group or permission.
#[derive(Debug, Deserialize)]
pub struct NameRequest {
    pub name: String,
}

#[derive(Debug, Deserialize)]
pub struct UsernameQuery {
    pub username: String,
}

// -------------------------
// Request input
// -------------------------

/// Unwrap an extracted body or query.
///
/// A rejected extraction still runs the route's authorization check first,
/// so a caller without access sees 401/403 rather than the expected shape;
/// an authorized caller gets a validation failure.
pub fn input<T, E: Display>(
    extracted: Result<T, E>,
    subject: &Subject,
    action: Action,
    resource: Resource,
) -> GatewayResult<T> {
    extracted.or_else(|rejection| {
        authorize(subject, action, resource)?;
        Err(GatewayError::Validation(format!("malformed request: {rejection}")))
    })
}

/// Self-service resource of the caller. Anonymous callers are refused on
/// every non-public resource, so `Users` stands in for them.
pub fn own(subject: &Subject, resource: fn(UserId) -> Resource) -> Resource {
    subject.user_id().map_or(Resource::Users, resource)
}

// -------------------------
// Response DTOs
// -------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NameView {
    pub name: String,
}

impl NameView {
    pub fn of(value: impl Display) -> Self {
        Self {
            name: value.to_string(),
        }
    }
}

pub fn names<T: Display>(page: Page<T>) -> Page<NameView> {
    page.map(NameView::of)
}

/// Render a gateway result with `status`, or the mapped error.
pub fn respond<T: Serialize>(status: StatusCode, result: GatewayResult<T>) -> axum::response::Response {
    match result {
        Ok(body) => (status, Json(body)).into_response(),
        Err(e) => errors::gateway_error_to_response(e),
    }
}

pub fn reject(err: GatewayError) -> axum::response::Response {
    errors::gateway_error_to_response(err)
}

/// `204 No Content`, or the mapped error.
pub fn no_content(result: GatewayResult<()>) -> axum::response::Response {
    match result {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(e) => errors::gateway_error_to_response(e),
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;

    use usergate_auth::{Identity, Role};

    use super::*;

    fn member() -> Subject {
        Subject::Authenticated(Identity {
            user_id: UserId::new(),
            username: "test_user".into(),
            role: Role::Member,
            permissions: BTreeSet::new(),
        })
    }

    #[test]
    fn rejected_input_is_authorized_before_it_is_reported() {
        let bad: Result<(), &str> = Err("missing field `name`");

        let anonymous = input(bad, &Subject::Anonymous, Action::Create, Resource::Groups);
        assert!(matches!(anonymous, Err(GatewayError::Unauthenticated(_))));

        let forbidden = input(bad, &member(), Action::Create, Resource::Groups);
        assert!(matches!(forbidden, Err(GatewayError::Forbidden(_))));

        let public = input(bad, &Subject::Anonymous, Action::Create, Resource::Session);
        assert!(matches!(public, Err(GatewayError::Validation(msg)) if msg.contains("missing field")));
    }

    #[test]
    fn own_resource_belongs_to_the_caller() {
        let subject = member();
        let me = subject.user_id().unwrap();
        assert_eq!(own(&subject, Resource::Password), Resource::Password(me));
        assert!(input(Err::<(), _>("bad"), &subject, Action::Update, own(&subject, Resource::Password))
            .is_err_and(|e| matches!(e, GatewayError::Validation(_))));
        assert!(input(Ok::<_, &str>(7), &subject, Action::Update, Resource::Users).is_ok_and(|v| v == 7));
    }
}
