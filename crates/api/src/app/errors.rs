use axum::http::StatusCode;
use axum::response::IntoResponse;
use serde_json::json;

use crate::gateway::GatewayError;

pub fn gateway_error_to_response(err: GatewayError) -> axum::response::Response {
    match err {
        GatewayError::Unauthenticated(msg) => {
            json_error(StatusCode::UNAUTHORIZED, "unauthenticated", msg)
        }
        GatewayError::Forbidden(msg) => json_error(StatusCode::FORBIDDEN, "forbidden", msg),
        GatewayError::Validation(msg) => {
            json_error(StatusCode::BAD_REQUEST, "validation_error", msg)
        }
        GatewayError::NotFound(msg) => json_error(StatusCode::NOT_FOUND, "not_found", msg),
        GatewayError::IntegrityViolation(msg) => {
            json_error(StatusCode::NOT_ACCEPTABLE, "integrity_violation", msg)
        }
        GatewayError::Internal(msg) => {
            tracing::error!(error = %msg, "internal error");
            json_error(
                StatusCode::INTERNAL_SERVER_ERROR,
                "internal_error",
                "internal server error",
            )
        }
    }
}

pub fn json_error(
    status: StatusCode,
    code: &'static str,
    message: impl Into<String>,
) -> axum::response::Response {
    (
        status,
        axum::Json(json!({
            "error": code,
            "message": message.into(),
        })),
    )
        .into_response()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn statuses_follow_the_error_taxonomy() {
        let cases = [
            (GatewayError::Unauthenticated("x".into()), StatusCode::UNAUTHORIZED),
            (GatewayError::Forbidden("x".into()), StatusCode::FORBIDDEN),
            (GatewayError::Validation("x".into()), StatusCode::BAD_REQUEST),
            (GatewayError::NotFound("x".into()), StatusCode::NOT_FOUND),
            (GatewayError::IntegrityViolation("x".into()), StatusCode::NOT_ACCEPTABLE),
            (GatewayError::Internal("x".into()), StatusCode::INTERNAL_SERVER_ERROR),
        ];
        for (err, status) in cases {
            assert_eq!(gateway_error_to_response(err).status(), status);
        }
    }
}
