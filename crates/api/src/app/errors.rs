use axum::http::StatusCode;
use axum::response::IntoResponse;
use serde_json::json;

use clarity_infra::jobs::QueueError;
use clarity_infra::qa::SubmitError;

pub fn submit_error_to_response(err: SubmitError) -> axum::response::Response {
    match err {
        SubmitError::Invalid(e) => json_error(StatusCode::BAD_REQUEST, "validation_error", e.to_string()),
        SubmitError::Queue(e) => queue_error(StatusCode::INTERNAL_SERVER_ERROR, e),
    }
}

/// Map a backend failure to `status`. Duplicate ids are always a conflict.
pub fn queue_error(status: StatusCode, err: QueueError) -> axum::response::Response {
    match err {
        QueueError::AlreadyExists(_) => json_error(StatusCode::CONFLICT, "conflict", err.to_string()),
        QueueError::NotFound(_) => json_error(StatusCode::NOT_FOUND, "not_found", err.to_string()),
        QueueError::Storage(_) | QueueError::Serialization(_) => json_error(status, "queue_error", err.to_string()),
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
