use std::sync::Arc;
use std::time::Duration;

use clarity_ai::testing::FakeAnalysisClient;
use clarity_ai::{QaPipeline, QaRequest, RetryPolicy};
use clarity_core::{JobId, JobStatus};
use clarity_infra::cache::InMemorySummaryCache;
use clarity_infra::jobs::{InMemoryJobQueue, JobQueue, JobWorker, QueueBackend, WorkerConfig};
use clarity_infra::qa::{QA_QUEUE, QaJobHandler, submit_qa_job};
use serde_json::json;

fn spawn_worker(queue: Arc<dyn JobQueue>, client: FakeAnalysisClient) -> clarity_infra::jobs::JobWorkerHandle {
    let pipeline = QaPipeline::new(Arc::new(client), Arc::new(InMemorySummaryCache::new()))
        .with_retry_policy(RetryPolicy::no_retry());
    JobWorker::new(queue, QaJobHandler::new(pipeline))
        .spawn(WorkerConfig::default().with_poll_interval(Duration::from_millis(5)))
}

async fn wait_terminal(queue: &dyn JobQueue, id: &JobId) -> JobStatus {
    for _ in 0..200 {
        let status = queue.status(id).await.unwrap();
        if status.is_terminal() {
            return status;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("job {id} did not finish within timeout");
}

#[tokio::test]
async fn summary_question_runs_to_completion() {
    let queue = InMemoryJobQueue::arc(QA_QUEUE);
    let handle = spawn_worker(queue.clone(), FakeAnalysisClient::new());

    let content = "Document: nda.txt\n\nThe parties agree to keep terms confidential.\n\n---\n\nDocument: lease.txt\n\nRent is due on the first day of each month.";
    let id = submit_qa_job(queue.as_ref(), &QaRequest::new(content, "Summarize all documents"))
        .await
        .unwrap();

    let status = wait_terminal(queue.as_ref(), &id).await;
    assert_eq!(status.name(), "completed");
    let result = status.result().unwrap();
    let answer = result["answer"].as_str().unwrap();
    assert!(answer.contains("nda.txt"));
    assert!(answer.contains("lease.txt"));
    assert!(status.error().is_none());

    let progress = status.progress().unwrap();
    assert_eq!(progress.total_docs, Some(2));
    assert_eq!(progress.completed_summaries.as_ref().map(Vec::len), Some(2));

    handle.shutdown().await;
}

#[tokio::test]
async fn jobs_drain_in_submission_order_through_backend() {
    let backend = QueueBackend::in_memory(QA_QUEUE);
    let queue: Arc<dyn JobQueue> = Arc::new(backend);
    let handle = spawn_worker(queue.clone(), FakeAnalysisClient::new());

    let mut ids = Vec::new();
    for i in 0..3 {
        let request = QaRequest::new(format!("Document: d{i}\n\nclause {i}"), format!("What does clause {i} say?"));
        ids.push(submit_qa_job(queue.as_ref(), &request).await.unwrap());
    }

    for (i, id) in ids.iter().enumerate() {
        let status = wait_terminal(queue.as_ref(), id).await;
        let answer = status.result().unwrap()["answer"].as_str().unwrap().to_string();
        assert!(answer.contains(&format!("answer to: What does clause {i} say?")));
    }
    handle.shutdown().await;
}

#[tokio::test]
async fn invalid_payload_is_recorded_as_failure() {
    let queue = InMemoryJobQueue::arc(QA_QUEUE);
    let handle = spawn_worker(queue.clone(), FakeAnalysisClient::new());

    let id = queue
        .submit(json!({"documentContent": "Document: a\n\ntext", "question": ""}), None)
        .await
        .unwrap();

    let status = wait_terminal(queue.as_ref(), &id).await;
    assert_eq!(status.name(), "failed");
    assert!(status.result().is_none());
    assert!(status.error().unwrap().contains("Missing required fields"));

    handle.shutdown().await;
}

#[tokio::test]
async fn unknown_job_is_not_found() {
    let queue = InMemoryJobQueue::new(QA_QUEUE);
    let status = queue.status(&JobId::new()).await.unwrap();
    assert_eq!(status, JobStatus::NotFound);
}
