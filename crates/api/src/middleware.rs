use std::sync::Arc;

use axum::{extract::State, http::HeaderMap, middleware::Next, response::Response};

use crate::app::services::AppServices;
use crate::context::SubjectContext;

#[derive(Clone)]
pub struct AuthState {
    pub services: Arc<AppServices>,
}

/// Resolve the bearer token (if any) and attach the caller to the request.
///
/// Never rejects: authorization happens per operation, so an anonymous
/// caller still reaches login and the signup check.
pub async fn subject_middleware(
    State(state): State<AuthState>,
    mut req: axum::http::Request<axum::body::Body>,
    next: Next,
) -> Response {
    let subject = state.services.gateway.authenticate(extract_bearer(req.headers()));
    req.extensions_mut().insert(SubjectContext::new(subject));
    next.run(req).await
}

fn extract_bearer(headers: &HeaderMap) -> Option<&str> {
    let header = headers.get(axum::http::header::AUTHORIZATION)?;
    let header = header.to_str().ok()?;
    let token = header.strip_prefix("Bearer ")?.trim();
    if token.is_empty() {
        return None;
    }
    Some(token)
}
