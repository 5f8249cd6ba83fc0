//! Worker runtime: claims jobs from a queue and runs a handler on each.

use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use futures::FutureExt;
use futures::future::join_all;
use serde_json::Value as JsonValue;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use clarity_core::JobRecord;

use super::queue::{JobQueue, QueueError};
use super::reporter::ProgressReporter;

/// Unit of work executed for each claimed job.
#[async_trait]
pub trait JobHandler: Send + Sync + 'static {
    async fn handle(&self, payload: JsonValue, progress: ProgressReporter) -> anyhow::Result<JsonValue>;
}

/// [`JobHandler`] backed by an async closure.
pub struct FnHandler<F>(F);

/// Wrap an async closure as a [`JobHandler`].
pub fn handler_fn<F, Fut>(f: F) -> FnHandler<F>
where
    F: Fn(JsonValue, ProgressReporter) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = anyhow::Result<JsonValue>> + Send + 'static,
{
    FnHandler(f)
}

#[async_trait]
impl<F, Fut> JobHandler for FnHandler<F>
where
    F: Fn(JsonValue, ProgressReporter) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = anyhow::Result<JsonValue>> + Send + 'static,
{
    async fn handle(&self, payload: JsonValue, progress: ProgressReporter) -> anyhow::Result<JsonValue> {
        (self.0)(payload, progress).await
    }
}

/// Worker configuration.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// How often to poll when the queue is empty
    pub poll_interval: Duration,
    /// Parallel claim loops; only honoured by queues that allow concurrent claims
    pub concurrency: usize,
    /// Name for logging
    pub name: String,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_millis(100),
            concurrency: 1,
            name: "job-worker".to_string(),
        }
    }
}

impl WorkerConfig {
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency;
        self
    }
}

/// Worker runtime statistics.
#[derive(Debug, Clone, Default, serde::Serialize)]
pub struct WorkerStats {
    pub jobs_processed: u64,
    pub jobs_succeeded: u64,
    pub jobs_failed: u64,
    pub current_running: usize,
    pub uptime_secs: u64,
}

/// Handle to control a running worker.
#[derive(Debug)]
pub struct JobWorkerHandle {
    shutdown: watch::Sender<bool>,
    join: Option<JoinHandle<()>>,
    stats: Arc<Mutex<WorkerStats>>,
}

impl JobWorkerHandle {
    /// Request graceful shutdown; in-flight jobs run to completion first.
    pub async fn shutdown(mut self) {
        let _ = self.shutdown.send(true);
        if let Some(join) = self.join.take() {
            let _ = join.await;
        }
    }

    /// Get current worker statistics.
    pub fn stats(&self) -> WorkerStats {
        self.stats.lock().unwrap().clone()
    }
}

/// Background job worker bound to one queue and one handler.
pub struct JobWorker {
    queue: Arc<dyn JobQueue>,
    handler: Arc<dyn JobHandler>,
    stats: Arc<Mutex<WorkerStats>>,
}

impl JobWorker {
    pub fn new(queue: Arc<dyn JobQueue>, handler: impl JobHandler) -> Self {
        Self {
            queue,
            handler: Arc::new(handler),
            stats: Arc::new(Mutex::new(WorkerStats::default())),
        }
    }

    /// Spawn the worker on the current tokio runtime.
    ///
    /// Queues that only support serial execution get exactly one claim loop,
    /// whatever `config.concurrency` says.
    pub fn spawn(self, config: WorkerConfig) -> JobWorkerHandle {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let stats = self.stats.clone();
        let worker = Arc::new(self);

        let join = tokio::spawn(async move {
            let started = Instant::now();
            match worker.queue.requeue_orphans().await {
                Ok(0) => {}
                Ok(n) => info!(worker = %config.name, requeued = n, "requeued orphaned jobs"),
                Err(e) => warn!(worker = %config.name, error = %e, "failed to requeue orphaned jobs"),
            }

            let loops = if worker.queue.allows_concurrent_claims() {
                config.concurrency.max(1)
            } else {
                1
            };
            info!(worker = %config.name, queue = %worker.queue.name(), loops, "job worker started");

            join_all((0..loops).map(|_| worker.claim_loop(&config, shutdown_rx.clone(), started))).await;

            info!(worker = %config.name, "job worker stopped");
        });

        JobWorkerHandle {
            shutdown: shutdown_tx,
            join: Some(join),
            stats,
        }
    }

    /// Claim and execute at most one job. Returns whether a job was run.
    pub async fn run_once(&self) -> Result<bool, QueueError> {
        match self.queue.claim_next().await? {
            Some(job) => {
                self.execute(job).await;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn claim_loop(&self, config: &WorkerConfig, mut shutdown: watch::Receiver<bool>, started: Instant) {
        while !*shutdown.borrow() {
            self.stats.lock().unwrap().uptime_secs = started.elapsed().as_secs();

            match self.run_once().await {
                Ok(true) => {}
                Ok(false) => idle(&mut shutdown, config.poll_interval).await,
                Err(e) => {
                    error!(worker = %config.name, error = %e, "failed to claim job");
                    idle(&mut shutdown, config.poll_interval).await;
                }
            }
        }
    }

    /// Run the handler for a claimed job and record its outcome.
    ///
    /// Handler errors and panics become a `failed` status; nothing is
    /// propagated to the claim loop.
    async fn execute(&self, job: JobRecord) {
        let queue = self.queue.name().to_string();
        debug!(queue = %queue, job_id = %job.id, "claimed job");
        self.stats.lock().unwrap().current_running += 1;

        let reporter = ProgressReporter::new(self.queue.clone(), job.id.clone());
        let outcome = AssertUnwindSafe(self.handler.handle(job.payload, reporter))
            .catch_unwind()
            .await;

        let (succeeded, recorded) = match outcome {
            Ok(Ok(result)) => (true, self.queue.complete(&job.id, result).await),
            Ok(Err(err)) => {
                let message = format!("{err:#}");
                warn!(queue = %queue, job_id = %job.id, error = %message, "job failed");
                (false, self.queue.fail(&job.id, &message).await)
            }
            Err(panic) => {
                let message = format!("job handler panicked: {}", panic_message(panic.as_ref()));
                error!(queue = %queue, job_id = %job.id, error = %message, "job handler panicked");
                (false, self.queue.fail(&job.id, &message).await)
            }
        };

        if let Err(e) = recorded {
            error!(queue = %queue, job_id = %job.id, error = %e, "failed to record job outcome");
        }

        let mut stats = self.stats.lock().unwrap();
        stats.current_running = stats.current_running.saturating_sub(1);
        stats.jobs_processed += 1;
        if succeeded {
            stats.jobs_succeeded += 1;
        } else {
            stats.jobs_failed += 1;
        }
        drop(stats);

        if succeeded {
            info!(queue = %queue, job_id = %job.id, "job completed");
        }
    }
}

async fn idle(shutdown: &mut watch::Receiver<bool>, interval: Duration) {
    tokio::select! {
        _ = tokio::time::sleep(interval) => {}
        Ok(()) = shutdown.changed() => {}
    }
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
