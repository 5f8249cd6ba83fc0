//! One-time selection between the durable and in-memory queue backends.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value as JsonValue;
use tracing::info;

use clarity_core::{JobId, JobProgress, JobRecord, JobStatus};

use super::in_memory::InMemoryJobQueue;
use super::queue::{JobQueue, QueueError};
#[cfg(feature = "redis")]
use super::redis_queue::RedisJobQueue;
use crate::config::AppConfig;

/// The queue backend chosen for this process.
///
/// Callers use it through [`JobQueue`]; the variant is fixed at construction.
#[derive(Clone)]
pub enum QueueBackend {
    InMemory(Arc<InMemoryJobQueue>),
    #[cfg(feature = "redis")]
    Redis(Arc<RedisJobQueue>),
}

impl QueueBackend {
    pub fn in_memory(name: impl Into<String>) -> Self {
        Self::InMemory(InMemoryJobQueue::arc(name))
    }

    /// Open queue `name` as configured: Redis when a queue URL is set (and
    /// the `redis` feature is compiled in), in-memory otherwise.
    ///
    /// An unreachable Redis server is an error; silently degrading a durable
    /// queue to a per-process one would lose jobs across processes.
    pub async fn open(config: &AppConfig, name: &str) -> Result<Self, QueueError> {
        let Some(url) = config.queue_redis_url.as_deref() else {
            info!(queue = name, "using in-memory job queue");
            return Ok(Self::in_memory(name));
        };

        #[cfg(feature = "redis")]
        {
            let queue = RedisJobQueue::connect(url, config.redis_prefix.clone(), name).await?;
            info!(queue = name, "using Redis job queue");
            Ok(Self::Redis(Arc::new(queue)))
        }
        #[cfg(not(feature = "redis"))]
        {
            let _ = url;
            tracing::warn!(queue = name, "queue Redis URL set but redis feature not enabled, falling back to in-memory");
            Ok(Self::in_memory(name))
        }
    }

    /// Whether jobs survive this process (and can be drained by other processes).
    pub fn is_durable(&self) -> bool {
        match self {
            Self::InMemory(_) => false,
            #[cfg(feature = "redis")]
            Self::Redis(_) => true,
        }
    }

    fn inner(&self) -> &dyn JobQueue {
        match self {
            Self::InMemory(q) => q.as_ref(),
            #[cfg(feature = "redis")]
            Self::Redis(q) => q.as_ref(),
        }
    }
}

#[async_trait]
impl JobQueue for QueueBackend {
    fn name(&self) -> &str {
        self.inner().name()
    }

    async fn submit(&self, payload: JsonValue, id: Option<JobId>) -> Result<JobId, QueueError> {
        self.inner().submit(payload, id).await
    }

    async fn status(&self, id: &JobId) -> Result<JobStatus, QueueError> {
        self.inner().status(id).await
    }

    async fn claim_next(&self) -> Result<Option<JobRecord>, QueueError> {
        self.inner().claim_next().await
    }

    async fn record_progress(&self, id: &JobId, update: JobProgress) -> Result<(), QueueError> {
        self.inner().record_progress(id, update).await
    }

    async fn complete(&self, id: &JobId, result: JsonValue) -> Result<(), QueueError> {
        self.inner().complete(id, result).await
    }

    async fn fail(&self, id: &JobId, error: &str) -> Result<(), QueueError> {
        self.inner().fail(id, error).await
    }

    async fn requeue_orphans(&self) -> Result<usize, QueueError> {
        self.inner().requeue_orphans().await
    }

    fn allows_concurrent_claims(&self) -> bool {
        self.inner().allows_concurrent_claims()
    }
}
