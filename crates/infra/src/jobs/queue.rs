//! Queue contract shared by every backend.

use async_trait::async_trait;
use serde_json::Value as JsonValue;

use clarity_core::{JobId, JobProgress, JobRecord, JobStatus};

/// Queue error.
#[derive(Debug, Clone, thiserror::Error)]
pub enum QueueError {
    #[error("job already exists: {0}")]
    AlreadyExists(JobId),
    #[error("job not found: {0}")]
    NotFound(JobId),
    #[error("storage error: {0}")]
    Storage(String),
    #[error("serialization error: {0}")]
    Serialization(String),
}

impl QueueError {
    pub fn storage(msg: impl std::fmt::Display) -> Self {
        Self::Storage(msg.to_string())
    }
}

impl From<serde_json::Error> for QueueError {
    fn from(e: serde_json::Error) -> Self {
        Self::Serialization(e.to_string())
    }
}

/// A named queue of jobs.
///
/// `submit` and `status` are the caller-facing half. The remaining operations
/// are used by the worker runtime, which is the only writer of job state once
/// a job has been submitted.
#[async_trait]
pub trait JobQueue: Send + Sync {
    /// Queue name (e.g. `qa`).
    fn name(&self) -> &str;

    /// Enqueue `payload`. A generated id is used when `id` is `None`.
    ///
    /// The payload is stored as-is; its shape is the handler's concern.
    async fn submit(&self, payload: JsonValue, id: Option<JobId>) -> Result<JobId, QueueError>;

    /// Current status. Unknown ids yield [`JobStatus::NotFound`].
    async fn status(&self, id: &JobId) -> Result<JobStatus, QueueError>;

    /// Claim the oldest pending job and mark it `active`.
    async fn claim_next(&self) -> Result<Option<JobRecord>, QueueError>;

    /// Merge a progress update into an active job.
    async fn record_progress(&self, id: &JobId, update: JobProgress) -> Result<(), QueueError>;

    /// Record the handler's return value.
    async fn complete(&self, id: &JobId, result: JsonValue) -> Result<(), QueueError>;

    /// Record the handler's error message.
    async fn fail(&self, id: &JobId, error: &str) -> Result<(), QueueError>;

    /// Return jobs claimed by a worker that died before finishing them to the
    /// pending list. Returns how many were requeued.
    async fn requeue_orphans(&self) -> Result<usize, QueueError> {
        Ok(0)
    }

    /// Whether several workers may claim from this queue at the same time.
    fn allows_concurrent_claims(&self) -> bool {
        false
    }
}
