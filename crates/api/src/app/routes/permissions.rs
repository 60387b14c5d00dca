use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Extension, Path, rejection::JsonRejection},
    http::StatusCode,
    routing::get,
};

use usergate_auth::{Action, Resource};

use crate::app::dto;
use crate::app::services::AppServices;
use crate::context::SubjectContext;

pub fn router() -> Router {
    Router::new()
        .route("/", get(list_permissions).post(create_permission))
        .route("/:name", get(get_permission).delete(destroy_permission))
}

pub async fn list_permissions(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<SubjectContext>,
) -> axum::response::Response {
    let result = services
        .gateway
        .list_permissions(ctx.subject())
        .map(dto::names);
    dto::respond(StatusCode::OK, result)
}

pub async fn create_permission(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<SubjectContext>,
    body: Result<Json<dto::NameRequest>, JsonRejection>,
) -> axum::response::Response {
    let result = dto::input(body, ctx.subject(), Action::Create, Resource::Permissions)
        .and_then(|Json(body)| services.gateway.create_permission(ctx.subject(), &body.name))
        .map(dto::NameView::of);
    dto::respond(StatusCode::CREATED, result)
}

pub async fn get_permission(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<SubjectContext>,
    Path(name): Path<String>,
) -> axum::response::Response {
    let result = services
        .gateway
        .get_permission(ctx.subject(), &name)
        .map(dto::NameView::of);
    dto::respond(StatusCode::OK, result)
}

pub async fn destroy_permission(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<SubjectContext>,
    Path(name): Path<String>,
) -> axum::response::Response {
    dto::no_content(services.gateway.destroy_permission(ctx.subject(), &name))
}
