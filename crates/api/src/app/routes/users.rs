//! `/users`: session, self service, administration and the two user-keyed
//! relations.

use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{
        Extension, Path, Query,
        rejection::{JsonRejection, QueryRejection},
    },
    http::StatusCode,
    routing::{delete, get, post},
};
use serde_json::json;

use usergate_auth::{Action, AdminUserPatch, NewUser, ProfilePatch, Resource, Subject};

use crate::app::dto;
use crate::app::services::{AppServices, blocking};
use crate::context::SubjectContext;
use crate::gateway::PasswordChange;

pub fn router() -> Router {
    Router::new()
        .route("/", get(list_users))
        .route("/login", post(login))
        .route("/token/refresh", post(refresh))
        .route("/password", post(change_password))
        .route("/self", get(get_self).patch(update_self))
        .route("/self/groups", get(list_self_groups))
        .route("/self/permissions", get(list_self_permissions))
        .route("/signup", post(signup))
        .route("/signup/check", get(check_username))
        .route("/:id", get(get_user).patch(update_user).delete(destroy_user))
        .route("/:id/groups", get(list_user_groups).post(add_user_group))
        .route("/:id/groups/:name", delete(remove_user_group))
        .route(
            "/:id/permissions",
            get(list_user_permissions).post(add_user_permission),
        )
        .route("/:id/permissions/:name", delete(remove_user_permission))
}

// ── session ─────────────────────────────────────────────────────────────────

pub async fn login(
    Extension(services): Extension<Arc<AppServices>>,
    body: Result<Json<dto::LoginRequest>, JsonRejection>,
) -> axum::response::Response {
    let Json(body) = match dto::input(body, &Subject::Anonymous, Action::Create, Resource::Session) {
        Ok(body) => body,
        Err(e) => return dto::reject(e),
    };
    let result = blocking(&services, move |gw| gw.login(&body.username, &body.password)).await;
    dto::respond(StatusCode::OK, result)
}

pub async fn refresh(
    Extension(services): Extension<Arc<AppServices>>,
    body: Result<Json<dto::RefreshRequest>, JsonRejection>,
) -> axum::response::Response {
    let result = dto::input(body, &Subject::Anonymous, Action::Create, Resource::Session)
        .and_then(|Json(body)| services.gateway.refresh(&body.refresh));
    dto::respond(StatusCode::OK, result)
}

pub async fn change_password(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<SubjectContext>,
    body: Result<Json<PasswordChange>, JsonRejection>,
) -> axum::response::Response {
    let password = dto::own(ctx.subject(), Resource::Password);
    let Json(body) = match dto::input(body, ctx.subject(), Action::Update, password) {
        Ok(body) => body,
        Err(e) => return dto::reject(e),
    };
    let result = blocking(&services, move |gw| gw.change_password(ctx.subject(), &body))
        .await
        .map(|()| json!({ "detail": "password changed" }));
    dto::respond(StatusCode::OK, result)
}

// ── self service ────────────────────────────────────────────────────────────

pub async fn get_self(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<SubjectContext>,
) -> axum::response::Response {
    dto::respond(StatusCode::OK, services.gateway.get_self(ctx.subject()))
}

pub async fn update_self(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<SubjectContext>,
    body: Result<Json<ProfilePatch>, JsonRejection>,
) -> axum::response::Response {
    let profile = dto::own(ctx.subject(), Resource::Profile);
    let result = dto::input(body, ctx.subject(), Action::Update, profile)
        .and_then(|Json(body)| services.gateway.update_self(ctx.subject(), &body));
    dto::respond(StatusCode::OK, result)
}

pub async fn list_self_groups(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<SubjectContext>,
) -> axum::response::Response {
    let result = services.gateway.list_self_groups(ctx.subject()).map(dto::names);
    dto::respond(StatusCode::OK, result)
}

pub async fn list_self_permissions(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<SubjectContext>,
) -> axum::response::Response {
    let result = services
        .gateway
        .list_self_permissions(ctx.subject())
        .map(dto::names);
    dto::respond(StatusCode::OK, result)
}

// ── administration ──────────────────────────────────────────────────────────

pub async fn signup(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<SubjectContext>,
    body: Result<Json<NewUser>, JsonRejection>,
) -> axum::response::Response {
    let Json(body) = match dto::input(body, ctx.subject(), Action::Create, Resource::Users) {
        Ok(body) => body,
        Err(e) => return dto::reject(e),
    };
    let result = blocking(&services, move |gw| gw.signup(ctx.subject(), &body)).await;
    dto::respond(StatusCode::OK, result)
}

pub async fn check_username(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<SubjectContext>,
    query: Result<Query<dto::UsernameQuery>, QueryRejection>,
) -> axum::response::Response {
    let result = dto::input(
        query,
        ctx.subject(),
        Action::Retrieve,
        Resource::UsernameAvailability,
    )
    .and_then(|Query(query)| services.gateway.check_username(ctx.subject(), &query.username));
    dto::respond(StatusCode::OK, result)
}

pub async fn list_users(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<SubjectContext>,
) -> axum::response::Response {
    dto::respond(StatusCode::OK, services.gateway.list_users(ctx.subject()))
}

pub async fn get_user(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<SubjectContext>,
    Path(id): Path<String>,
) -> axum::response::Response {
    dto::respond(StatusCode::OK, services.gateway.get_user(ctx.subject(), &id))
}

pub async fn update_user(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<SubjectContext>,
    Path(id): Path<String>,
    body: Result<Json<AdminUserPatch>, JsonRejection>,
) -> axum::response::Response {
    let result = dto::input(body, ctx.subject(), Action::Update, Resource::Users)
        .and_then(|Json(body)| services.gateway.update_user(ctx.subject(), &id, &body));
    dto::respond(StatusCode::OK, result)
}

pub async fn destroy_user(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<SubjectContext>,
    Path(id): Path<String>,
) -> axum::response::Response {
    dto::no_content(services.gateway.destroy_user(ctx.subject(), &id))
}

// ── relations ───────────────────────────────────────────────────────────────

pub async fn list_user_groups(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<SubjectContext>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let result = services
        .gateway
        .list_user_groups(ctx.subject(), &id)
        .map(dto::names);
    dto::respond(StatusCode::OK, result)
}

pub async fn add_user_group(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<SubjectContext>,
    Path(id): Path<String>,
    body: Result<Json<dto::NameRequest>, JsonRejection>,
) -> axum::response::Response {
    let result = dto::input(body, ctx.subject(), Action::Create, Resource::UserGroups)
        .and_then(|Json(body)| services.gateway.add_user_group(ctx.subject(), &id, &body.name))
        .map(dto::NameView::of);
    dto::respond(StatusCode::CREATED, result)
}

pub async fn remove_user_group(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<SubjectContext>,
    Path((id, name)): Path<(String, String)>,
) -> axum::response::Response {
    dto::no_content(services.gateway.remove_user_group(ctx.subject(), &id, &name))
}

pub async fn list_user_permissions(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<SubjectContext>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let result = services
        .gateway
        .list_user_permissions(ctx.subject(), &id)
        .map(dto::names);
    dto::respond(StatusCode::OK, result)
}

pub async fn add_user_permission(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<SubjectContext>,
    Path(id): Path<String>,
    body: Result<Json<dto::NameRequest>, JsonRejection>,
) -> axum::response::Response {
    let result = dto::input(body, ctx.subject(), Action::Create, Resource::UserPermissions)
        .and_then(|Json(body)| {
            services
                .gateway
                .add_user_permission(ctx.subject(), &id, &body.name)
        })
        .map(dto::NameView::of);
    dto::respond(StatusCode::CREATED, result)
}

pub async fn remove_user_permission(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<SubjectContext>,
    Path((id, name)): Path<(String, String)>,
) -> axum::response::Response {
    dto::no_content(
        services
            .gateway
            .remove_user_permission(ctx.subject(), &id, &name),
    )
}
