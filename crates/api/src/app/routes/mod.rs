use axum::{
    Router,
    routing::{get, post},
};

pub mod jobs;
pub mod system;

/// Router for the `/api` endpoints.
pub fn router() -> Router {
    Router::new()
        .route("/submit-qa-job", post(jobs::submit_qa_job))
        .route("/qa-job-status", get(jobs::qa_job_status))
}
