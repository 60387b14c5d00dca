use axum::Router;

pub mod groups;
pub mod permissions;
pub mod system;
pub mod users;

/// Router for every endpoint behind the subject middleware.
pub fn router() -> Router {
    Router::new()
        .nest("/users", users::router())
        .nest("/groups", groups::router())
        .nest("/permissions", permissions::router())
}
