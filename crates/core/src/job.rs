//! Job records, lifecycle, and progress.
//!
//! A job is created `queued`, becomes `active` when a worker claims it, and then
//! reaches exactly one terminal state (`completed` or `failed`). The result and
//! the error live inside their respective state variants, so a record can never
//! carry both (or a result without having completed).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use crate::id::JobId;
use crate::summary::DocumentSummary;

/// Lifecycle state of a stored job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum JobState {
    /// Waiting to be picked up by a worker.
    Queued,
    /// A worker is executing the handler.
    Active,
    /// Handler returned a value.
    Completed { result: JsonValue },
    /// Handler failed; `error` is the error's message.
    Failed { error: String },
}

impl JobState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobState::Completed { .. } | JobState::Failed { .. })
    }

    pub fn name(&self) -> &'static str {
        match self {
            JobState::Queued => "queued",
            JobState::Active => "active",
            JobState::Completed { .. } => "completed",
            JobState::Failed { .. } => "failed",
        }
    }
}

/// Incremental progress of a running job.
///
/// Every field is optional so that a handler can publish partial updates;
/// [`JobProgress::merge`] overwrites only the fields present in the update.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobProgress {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_doc: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_docs: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_chunk: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_chunks: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_summaries: Option<Vec<DocumentSummary>>,
}

impl JobProgress {
    /// Progress at document granularity (1-based `current_doc`).
    pub fn documents(current_doc: usize, total_docs: usize) -> Self {
        Self {
            current_doc: Some(current_doc),
            total_docs: Some(total_docs),
            ..Self::default()
        }
    }

    pub fn with_chunks(mut self, current_chunk: usize, total_chunks: usize) -> Self {
        self.current_chunk = Some(current_chunk);
        self.total_chunks = Some(total_chunks);
        self
    }

    pub fn with_summaries(mut self, summaries: Vec<DocumentSummary>) -> Self {
        self.completed_summaries = Some(summaries);
        self
    }

    /// Merge `update` into `self`; absent fields keep their previous value.
    pub fn merge(&mut self, update: JobProgress) {
        if update.current_doc.is_some() {
            self.current_doc = update.current_doc;
        }
        if update.total_docs.is_some() {
            self.total_docs = update.total_docs;
        }
        if update.current_chunk.is_some() {
            self.current_chunk = update.current_chunk;
        }
        if update.total_chunks.is_some() {
            self.total_chunks = update.total_chunks;
        }
        if update.completed_summaries.is_some() {
            self.completed_summaries = update.completed_summaries;
        }
    }
}

/// A job as owned by a queue backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobRecord {
    pub id: JobId,
    pub queue: String,
    pub payload: JsonValue,
    #[serde(flatten)]
    pub state: JobState,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub progress: Option<JobProgress>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl JobRecord {
    /// Create a freshly submitted (`queued`) record.
    pub fn new(id: JobId, queue: impl Into<String>, payload: JsonValue) -> Self {
        let now = Utc::now();
        Self {
            id,
            queue: queue.into(),
            payload,
            state: JobState::Queued,
            progress: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Mark the job as claimed by a worker. Returns `false` if already terminal.
    pub fn mark_active(&mut self) -> bool {
        self.transition(JobState::Active)
    }

    /// Record a successful result. Returns `false` if already terminal.
    pub fn mark_completed(&mut self, result: JsonValue) -> bool {
        self.transition(JobState::Completed { result })
    }

    /// Record a failure message. Returns `false` if already terminal.
    pub fn mark_failed(&mut self, error: impl Into<String>) -> bool {
        self.transition(JobState::Failed {
            error: error.into(),
        })
    }

    /// Merge a progress update. Ignored once the job is terminal.
    pub fn merge_progress(&mut self, update: JobProgress) -> bool {
        if self.state.is_terminal() {
            return false;
        }
        self.progress.get_or_insert_with(JobProgress::default).merge(update);
        self.updated_at = Utc::now();
        true
    }

    fn transition(&mut self, next: JobState) -> bool {
        if self.state.is_terminal() {
            return false;
        }
        self.state = next;
        self.updated_at = Utc::now();
        true
    }

    /// Caller-facing view of this record.
    pub fn status(&self) -> JobStatus {
        let created_at = self.created_at;
        let updated_at = self.updated_at;
        let progress = self.progress.clone();
        match &self.state {
            JobState::Queued => JobStatus::Queued {
                created_at,
                updated_at,
            },
            JobState::Active => JobStatus::Active {
                progress,
                created_at,
                updated_at,
            },
            JobState::Completed { result } => JobStatus::Completed {
                result: result.clone(),
                progress,
                created_at,
                updated_at,
            },
            JobState::Failed { error } => JobStatus::Failed {
                error: error.clone(),
                progress,
                created_at,
                updated_at,
            },
        }
    }
}

/// Status as returned to pollers.
///
/// `NotFound` is a regular value, not an error: polling an unknown id is a
/// normal outcome (evicted, mistyped, or never submitted).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case", rename_all_fields = "camelCase")]
pub enum JobStatus {
    Queued {
        created_at: DateTime<Utc>,
        updated_at: DateTime<Utc>,
    },
    Active {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        progress: Option<JobProgress>,
        created_at: DateTime<Utc>,
        updated_at: DateTime<Utc>,
    },
    Completed {
        result: JsonValue,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        progress: Option<JobProgress>,
        created_at: DateTime<Utc>,
        updated_at: DateTime<Utc>,
    },
    Failed {
        error: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        progress: Option<JobProgress>,
        created_at: DateTime<Utc>,
        updated_at: DateTime<Utc>,
    },
    NotFound,
}

impl JobStatus {
    pub fn name(&self) -> &'static str {
        match self {
            JobStatus::Queued { .. } => "queued",
            JobStatus::Active { .. } => "active",
            JobStatus::Completed { .. } => "completed",
            JobStatus::Failed { .. } => "failed",
            JobStatus::NotFound => "not_found",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Completed { .. } | JobStatus::Failed { .. })
    }

    pub fn result(&self) -> Option<&JsonValue> {
        match self {
            JobStatus::Completed { result, .. } => Some(result),
            _ => None,
        }
    }

    pub fn error(&self) -> Option<&str> {
        match self {
            JobStatus::Failed { error, .. } => Some(error),
            _ => None,
        }
    }

    pub fn progress(&self) -> Option<&JobProgress> {
        match self {
            JobStatus::Active { progress, .. }
            | JobStatus::Completed { progress, .. }
            | JobStatus::Failed { progress, .. } => progress.as_ref(),
            _ => None,
        }
    }
}

impl From<Option<JobRecord>> for JobStatus {
    fn from(record: Option<JobRecord>) -> Self {
        record.map_or(JobStatus::NotFound, |r| r.status())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn record() -> JobRecord {
        JobRecord::new(JobId::new(), "qa", json!({"question": "q"}))
    }

    #[test]
    fn lifecycle_reaches_single_terminal_state() {
        let mut job = record();
        assert_eq!(job.state, JobState::Queued);

        assert!(job.mark_active());
        assert!(job.mark_completed(json!({"answer": "a"})));

        // Terminal states never change again.
        assert!(!job.mark_failed("late failure"));
        assert!(!job.mark_active());
        assert_eq!(job.state.name(), "completed");
    }

    #[test]
    fn completed_status_has_result_and_no_error() {
        let mut job = record();
        job.mark_active();
        job.mark_completed(json!(42));

        let status = job.status();
        assert_eq!(status.result(), Some(&json!(42)));
        assert!(status.error().is_none());

        let body = serde_json::to_value(&status).unwrap();
        assert_eq!(body["status"], "completed");
        assert_eq!(body["result"], 42);
        assert!(body.get("error").is_none());
    }

    #[test]
    fn failed_status_has_error_and_no_result() {
        let mut job = record();
        job.mark_active();
        job.mark_failed("boom");

        let body = serde_json::to_value(job.status()).unwrap();
        assert_eq!(body["status"], "failed");
        assert_eq!(body["error"], "boom");
        assert!(body.get("result").is_none());
    }

    #[test]
    fn progress_merge_keeps_absent_fields() {
        let mut job = record();
        job.mark_active();
        job.merge_progress(JobProgress::documents(1, 3).with_chunks(2, 4));
        job.merge_progress(JobProgress::documents(2, 3));

        let progress = job.progress.clone().unwrap();
        assert_eq!(progress.current_doc, Some(2));
        assert_eq!(progress.current_chunk, Some(2));
        assert_eq!(progress.total_chunks, Some(4));

        job.mark_completed(json!(null));
        assert!(!job.merge_progress(JobProgress::documents(3, 3)));
    }

    #[test]
    fn record_round_trips_through_json() {
        let mut job = record();
        job.mark_active();
        job.merge_progress(JobProgress::documents(1, 1));

        let raw = serde_json::to_string(&job).unwrap();
        let back: JobRecord = serde_json::from_str(&raw).unwrap();
        assert_eq!(back, job);
    }

    #[test]
    fn missing_record_maps_to_not_found() {
        let status = JobStatus::from(None);
        assert_eq!(status.name(), "not_found");
        assert_eq!(
            serde_json::to_value(status).unwrap(),
            json!({"status": "not_found"})
        );
    }
}
