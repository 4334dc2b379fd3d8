use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;

use procura_auth::AuthzError;
use procura_core::DomainError;
use procura_infra::{DispatchError, StoreError};

/// Handler outcome: both arms are finished responses.
pub type ApiResult = Result<Response, Response>;

pub fn dispatch_error_to_response(err: DispatchError) -> Response {
    match err {
        DispatchError::Conflict(msg) => json_error(StatusCode::CONFLICT, "conflict", msg),
        DispatchError::UniqueViolation(msg) => json_error(StatusCode::CONFLICT, "unique_violation", msg),
        DispatchError::Validation(msg) => json_error(StatusCode::BAD_REQUEST, "validation_error", msg),
        DispatchError::InvariantViolation(msg) => {
            json_error(StatusCode::UNPROCESSABLE_ENTITY, "invariant_violation", msg)
        }
        DispatchError::Unauthorized => json_error(StatusCode::FORBIDDEN, "forbidden", "unauthorized"),
        DispatchError::NotFound => json_error(StatusCode::NOT_FOUND, "not_found", "not found"),
        DispatchError::Serialization(msg) => {
            json_error(StatusCode::INTERNAL_SERVER_ERROR, "serialization_error", msg)
        }
        DispatchError::Store(e) => {
            tracing::error!(error = %e, "store failure");
            json_error(StatusCode::INTERNAL_SERVER_ERROR, "store_error", e.to_string())
        }
        DispatchError::Publish(msg) => json_error(StatusCode::BAD_GATEWAY, "publish_error", msg),
    }
}

pub fn store_error_to_response(err: StoreError) -> Response {
    dispatch_error_to_response(err.into())
}

pub fn domain_error_to_response(err: DomainError) -> Response {
    dispatch_error_to_response(err.into())
}

pub fn forbidden(err: AuthzError) -> Response {
    json_error(StatusCode::FORBIDDEN, "forbidden", err.to_string())
}

pub fn not_found(what: &str) -> Response {
    json_error(StatusCode::NOT_FOUND, "not_found", format!("{what} not found"))
}

pub fn invalid_id(what: &str) -> Response {
    json_error(StatusCode::BAD_REQUEST, "invalid_id", format!("invalid {what} id"))
}

pub fn json_error(
    status: StatusCode,
    code: &'static str,
    message: impl Into<String>,
) -> Response {
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
    fn status_mapping() {
        let cases = [
            (DispatchError::Validation("x".into()), StatusCode::BAD_REQUEST),
            (DispatchError::NotFound, StatusCode::NOT_FOUND),
            (DispatchError::Conflict("x".into()), StatusCode::CONFLICT),
            (DispatchError::UniqueViolation("x".into()), StatusCode::CONFLICT),
            (DispatchError::InvariantViolation("x".into()), StatusCode::UNPROCESSABLE_ENTITY),
            (DispatchError::Unauthorized, StatusCode::FORBIDDEN),
            (
                DispatchError::Store(StoreError::Backend("down".into())),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
        ];
        for (err, status) in cases {
            assert_eq!(dispatch_error_to_response(err).status(), status);
        }
    }
}
