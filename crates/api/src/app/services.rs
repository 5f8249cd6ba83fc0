//! Service wiring shared by the API and worker binaries.

use std::sync::Arc;

use anyhow::Context;
use tracing::info;

use clarity_ai::{AnalysisClient, GeminiClient, QaPipeline};
use clarity_core::SummaryCache;
use clarity_infra::cache::open_summary_cache;
use clarity_infra::config::AppConfig;
use clarity_infra::jobs::{JobWorker, JobWorkerHandle, QueueBackend, WorkerConfig};
use clarity_infra::qa::{QA_QUEUE, QaJobHandler};

/// State shared by every request handler.
#[derive(Clone)]
pub struct AppServices {
    pub queue: QueueBackend,
}

impl AppServices {
    pub fn new(queue: QueueBackend) -> Self {
        Self { queue }
    }

    /// Open the Q&A queue selected by `config`.
    pub async fn from_config(config: &AppConfig) -> anyhow::Result<Self> {
        let queue = QueueBackend::open(config, QA_QUEUE)
            .await
            .context("failed to open qa job queue")?;
        Ok(Self::new(queue))
    }

    /// Whether this process must run its own worker.
    ///
    /// An in-memory queue has no other consumer, so the embedded worker is
    /// forced on regardless of configuration.
    pub fn needs_embedded_worker(&self, config: &AppConfig) -> bool {
        config.embedded_worker || !self.queue.is_durable()
    }
}

/// Remote analysis client built from `config`.
pub fn analysis_client(config: &AppConfig) -> anyhow::Result<Arc<dyn AnalysisClient>> {
    let client = GeminiClient::new(config.gemini()).context("failed to build analysis client")?;
    Ok(Arc::new(client))
}

pub fn qa_pipeline(config: &AppConfig, client: Arc<dyn AnalysisClient>, cache: Arc<dyn SummaryCache>) -> QaPipeline {
    QaPipeline::new(client, cache).with_max_chunk_chars(config.chunk_max_chars)
}

/// Start a Q&A worker draining `queue`.
pub fn spawn_qa_worker(queue: &QueueBackend, pipeline: QaPipeline, config: WorkerConfig) -> JobWorkerHandle {
    info!(worker = %config.name, durable = queue.is_durable(), "starting qa worker");
    JobWorker::new(Arc::new(queue.clone()), QaJobHandler::new(pipeline)).spawn(config)
}

/// Full production wiring of a worker: client, cache, pipeline.
pub async fn start_qa_worker(config: &AppConfig, queue: &QueueBackend, name: &str) -> anyhow::Result<JobWorkerHandle> {
    let client = analysis_client(config)?;
    let cache = open_summary_cache(config).await;
    let pipeline = qa_pipeline(config, client, cache);
    Ok(spawn_qa_worker(queue, pipeline, config.worker(name)))
}
