use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Extension, Path, rejection::JsonRejection},
    http::StatusCode,
    routing::{delete, get},
};

use usergate_auth::{Action, Resource};

use crate::app::dto;
use crate::app::services::AppServices;
use crate::context::SubjectContext;

pub fn router() -> Router {
    Router::new()
        .route("/", get(list_groups).post(create_group))
        .route("/:name", get(get_group).delete(destroy_group))
        .route(
            "/:name/permissions",
            get(list_group_permissions).post(add_group_permission),
        )
        .route("/:name/permissions/:permission", delete(remove_group_permission))
}

pub async fn list_groups(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<SubjectContext>,
) -> axum::response::Response {
    let result = services.gateway.list_groups(ctx.subject()).map(dto::names);
    dto::respond(StatusCode::OK, result)
}

pub async fn create_group(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<SubjectContext>,
    body: Result<Json<dto::NameRequest>, JsonRejection>,
) -> axum::response::Response {
    let result = dto::input(body, ctx.subject(), Action::Create, Resource::Groups)
        .and_then(|Json(body)| services.gateway.create_group(ctx.subject(), &body.name))
        .map(dto::NameView::of);
    dto::respond(StatusCode::CREATED, result)
}

pub async fn get_group(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<SubjectContext>,
    Path(name): Path<String>,
) -> axum::response::Response {
    let result = services
        .gateway
        .get_group(ctx.subject(), &name)
        .map(dto::NameView::of);
    dto::respond(StatusCode::OK, result)
}

pub async fn destroy_group(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<SubjectContext>,
    Path(name): Path<String>,
) -> axum::response::Response {
    dto::no_content(services.gateway.destroy_group(ctx.subject(), &name))
}

pub async fn list_group_permissions(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<SubjectContext>,
    Path(name): Path<String>,
) -> axum::response::Response {
    let result = services
        .gateway
        .list_group_permissions(ctx.subject(), &name)
        .map(dto::names);
    dto::respond(StatusCode::OK, result)
}

pub async fn add_group_permission(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<SubjectContext>,
    Path(name): Path<String>,
    body: Result<Json<dto::NameRequest>, JsonRejection>,
) -> axum::response::Response {
    let result = dto::input(body, ctx.subject(), Action::Create, Resource::GroupPermissions)
        .and_then(|Json(body)| {
            services
                .gateway
                .add_group_permission(ctx.subject(), &name, &body.name)
        })
        .map(dto::NameView::of);
    dto::respond(StatusCode::CREATED, result)
}

pub async fn remove_group_permission(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<SubjectContext>,
    Path((name, permission)): Path<(String, String)>,
) -> axum::response::Response {
    dto::no_content(
        services
            .gateway
            .remove_group_permission(ctx.subject(), &name, &permission),
    )
}
