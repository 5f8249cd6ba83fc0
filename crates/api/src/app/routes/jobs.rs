use std::sync::Arc;

use axum::{
    Json,
    extract::{Extension, Query, rejection::JsonRejection},
    http::StatusCode,
    response::IntoResponse,
};
use tracing::warn;

use clarity_ai::QaRequest;
use clarity_core::JobId;
use clarity_infra::jobs::JobQueue;
use clarity_infra::qa;

use crate::app::services::AppServices;
use crate::app::{dto, errors};

pub async fn submit_qa_job(
    Extension(services): Extension<Arc<AppServices>>,
    body: Result<Json<dto::SubmitQaJobRequest>, JsonRejection>,
) -> axum::response::Response {
    let Json(body) = match body {
        Ok(b) => b,
        Err(e) => return errors::json_error(StatusCode::BAD_REQUEST, "invalid_body", e.body_text()),
    };

    let request = QaRequest::from(body);
    match qa::submit_qa_job(&services.queue, &request).await {
        Ok(id) => Json(dto::SubmitQaJobResponse { job_id: id.into_inner() }).into_response(),
        Err(e) => {
            warn!(error = %e, "qa job submission rejected");
            errors::submit_error_to_response(e)
        }
    }
}

pub async fn qa_job_status(
    Extension(services): Extension<Arc<AppServices>>,
    Query(query): Query<dto::JobStatusQuery>,
) -> axum::response::Response {
    let id: JobId = match query.job_id.as_deref().unwrap_or_default().parse() {
        Ok(id) => id,
        Err(_) => return errors::json_error(StatusCode::BAD_REQUEST, "missing_job_id", "jobId is required"),
    };

    match services.queue.status(&id).await {
        Ok(status) => Json(status).into_response(),
        Err(e) => {
            warn!(job_id = %id, error = %e, "job status lookup failed");
            errors::queue_error(StatusCode::SERVICE_UNAVAILABLE, e)
        }
    }
}
