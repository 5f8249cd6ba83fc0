//! In-process fallback queue.
//!
//! Pending ids live in a FIFO next to a map of job records. Records are never
//! evicted on their own; [`InMemoryJobQueue::clear_job`] releases one
//! explicitly.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use serde_json::Value as JsonValue;
use tracing::{debug, warn};

use clarity_core::{JobId, JobProgress, JobRecord, JobStatus};

use super::queue::{JobQueue, QueueError};

#[derive(Debug, Default)]
struct QueueState {
    pending: VecDeque<JobId>,
    jobs: HashMap<JobId, JobRecord>,
}

/// In-memory job queue for tests/dev and single-process deployments.
#[derive(Debug)]
pub struct InMemoryJobQueue {
    name: String,
    state: RwLock<QueueState>,
}

impl InMemoryJobQueue {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            state: RwLock::new(QueueState::default()),
        }
    }

    pub fn arc(name: impl Into<String>) -> Arc<Self> {
        Arc::new(Self::new(name))
    }

    /// Drop a job record (and its pending entry, if still queued).
    pub fn clear_job(&self, id: &JobId) -> bool {
        let mut state = self.state.write().unwrap();
        state.pending.retain(|p| p != id);
        state.jobs.remove(id).is_some()
    }

    /// Every known job, oldest first.
    pub fn list_jobs(&self) -> Vec<JobRecord> {
        let state = self.state.read().unwrap();
        let mut jobs: Vec<JobRecord> = state.jobs.values().cloned().collect();
        jobs.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));
        jobs
    }

    pub fn pending_len(&self) -> usize {
        self.state.read().unwrap().pending.len()
    }

    fn with_job<T>(
        &self,
        id: &JobId,
        f: impl FnOnce(&mut JobRecord) -> T,
    ) -> Result<T, QueueError> {
        let mut state = self.state.write().unwrap();
        let job = state
            .jobs
            .get_mut(id)
            .ok_or_else(|| QueueError::NotFound(id.clone()))?;
        Ok(f(job))
    }
}

#[async_trait]
impl JobQueue for InMemoryJobQueue {
    fn name(&self) -> &str {
        &self.name
    }

    async fn submit(&self, payload: JsonValue, id: Option<JobId>) -> Result<JobId, QueueError> {
        let id = id.unwrap_or_default();
        let mut state = self.state.write().unwrap();
        if state.jobs.contains_key(&id) {
            return Err(QueueError::AlreadyExists(id));
        }
        state
            .jobs
            .insert(id.clone(), JobRecord::new(id.clone(), self.name.clone(), payload));
        state.pending.push_back(id.clone());
        debug!(queue = %self.name, job_id = %id, "job queued");
        Ok(id)
    }

    async fn status(&self, id: &JobId) -> Result<JobStatus, QueueError> {
        let state = self.state.read().unwrap();
        Ok(JobStatus::from(state.jobs.get(id).cloned()))
    }

    async fn claim_next(&self) -> Result<Option<JobRecord>, QueueError> {
        let mut state = self.state.write().unwrap();
        while let Some(id) = state.pending.pop_front() {
            // Cleared while pending.
            let Some(job) = state.jobs.get_mut(&id) else {
                continue;
            };
            if job.mark_active() {
                return Ok(Some(job.clone()));
            }
        }
        Ok(None)
    }

    async fn record_progress(&self, id: &JobId, update: JobProgress) -> Result<(), QueueError> {
        self.with_job(id, |job| {
            if !job.merge_progress(update) {
                debug!(queue = %self.name, job_id = %id, "progress after terminal state ignored");
            }
        })
    }

    async fn complete(&self, id: &JobId, result: JsonValue) -> Result<(), QueueError> {
        self.with_job(id, |job| {
            if !job.mark_completed(result) {
                warn!(queue = %self.name, job_id = %id, state = job.state.name(), "job already terminal");
            }
        })
    }

    async fn fail(&self, id: &JobId, error: &str) -> Result<(), QueueError> {
        self.with_job(id, |job| {
            if !job.mark_failed(error) {
                warn!(queue = %self.name, job_id = %id, state = job.state.name(), "job already terminal");
            }
        })
    }
}
