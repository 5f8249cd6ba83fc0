//! Q&A jobs: submission helper and the handler the worker runs.

use anyhow::Context;
use async_trait::async_trait;
use serde_json::Value as JsonValue;
use tracing::info;

use clarity_ai::{QaPipeline, QaRequest};
use clarity_core::JobId;

use crate::jobs::{JobHandler, JobQueue, ProgressReporter, QueueError};

/// Queue name of Q&A jobs.
pub const QA_QUEUE: &str = "qa";

#[derive(Debug, thiserror::Error)]
pub enum SubmitError {
    #[error(transparent)]
    Invalid(#[from] clarity_core::CoreError),
    #[error(transparent)]
    Queue(#[from] QueueError),
}

/// Validate `request` and enqueue it, returning the new job's id.
pub async fn submit_qa_job(queue: &dyn JobQueue, request: &QaRequest) -> Result<JobId, SubmitError> {
    request.validate()?;
    let payload = serde_json::to_value(request).map_err(QueueError::from)?;
    let id = queue.submit(payload, None).await?;
    info!(queue = queue.name(), job_id = %id, "qa job submitted");
    Ok(id)
}

/// Runs [`QaPipeline::answer`] on each claimed payload.
pub struct QaJobHandler {
    pipeline: QaPipeline,
}

impl QaJobHandler {
    pub fn new(pipeline: QaPipeline) -> Self {
        Self { pipeline }
    }
}

fn parse_request(payload: JsonValue) -> anyhow::Result<QaRequest> {
    let request: QaRequest = serde_json::from_value(payload).context("invalid qa job payload")?;
    request.validate()?;
    Ok(request)
}

#[async_trait]
impl JobHandler for QaJobHandler {
    async fn handle(&self, payload: JsonValue, progress: ProgressReporter) -> anyhow::Result<JsonValue> {
        let request = parse_request(payload)?;
        let answer = self.pipeline.answer(&request, &progress).await;
        Ok(serde_json::to_value(answer)?)
    }
}
