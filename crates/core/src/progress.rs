//! Progress reporting capability handed to job handlers.

use async_trait::async_trait;

use crate::job::JobProgress;

/// Receiver of incremental progress from a running handler.
///
/// The worker runtime passes an implementation into each handler invocation;
/// pipelines that run outside a job use [`NoopProgress`]. Reporting never
/// fails from the caller's point of view.
#[async_trait]
pub trait ProgressSink: Send + Sync {
    async fn report(&self, update: JobProgress);
}

/// Progress sink that discards every update.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopProgress;

#[async_trait]
impl ProgressSink for NoopProgress {
    async fn report(&self, _update: JobProgress) {}
}
