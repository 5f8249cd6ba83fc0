use std::sync::Arc;

use async_trait::async_trait;
use tracing::warn;

use clarity_core::{JobId, JobProgress, ProgressSink};

use super::queue::{JobQueue, QueueError};

/// Progress channel for the job a handler is currently executing.
///
/// Handed to the handler by the worker runtime; it is the only way a handler
/// can touch its job record.
#[derive(Clone)]
pub struct ProgressReporter {
    queue: Arc<dyn JobQueue>,
    job_id: JobId,
}

impl ProgressReporter {
    pub fn new(queue: Arc<dyn JobQueue>, job_id: JobId) -> Self {
        Self { queue, job_id }
    }

    pub fn job_id(&self) -> &JobId {
        &self.job_id
    }

    /// Merge `update` into the job's progress, surfacing storage errors.
    pub async fn update(&self, update: JobProgress) -> Result<(), QueueError> {
        self.queue.record_progress(&self.job_id, update).await
    }
}

#[async_trait]
impl ProgressSink for ProgressReporter {
    async fn report(&self, update: JobProgress) {
        if let Err(e) = self.update(update).await {
            warn!(queue = %self.queue.name(), job_id = %self.job_id, error = %e, "failed to record progress");
        }
    }
}
