//! Chunked summarization of multi-document uploads.
//!
//! Each document is chunked on paragraph breaks, every chunk is summarized,
//! and multi-chunk documents get one combining pass over the chunk summaries.
//! Remote failures never abort the run: they are recorded inline on the
//! document they affected.

use std::sync::Arc;

use clarity_core::{
    DEFAULT_MAX_CHUNK_CHARS, DocumentSummary, JobProgress, ProgressSink, SummaryCache, chunk_text,
    summary_cache_key,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument, warn};

use crate::client::{AnalysisClient, SummarizeRequest};
use crate::documents::SourceDocument;
use crate::error::AiError;
use crate::retry::{RetryPolicy, with_retry};

pub const NO_CONTENT: &str = "No content available.";
pub const NO_SUMMARY: &str = "No summary could be generated.";
pub const COMBINE_FALLBACK_NOTE: &str =
    "Could not generate a combined summary, showing chunk summaries instead.";
pub const SUMMARY_FEEDBACK: &str = "Detailed summaries of all documents are provided below. \
     Large documents are chunked and summarized in parts for accuracy.";

/// Outcome of summarizing every document of an upload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SummaryDigest {
    pub documents: Vec<DocumentSummary>,
    pub follow_up_questions: Vec<String>,
}

impl SummaryDigest {
    pub fn new(documents: Vec<DocumentSummary>) -> Self {
        let follow_up_questions = follow_up_suggestions(&documents);
        Self {
            documents,
            follow_up_questions,
        }
    }

    /// Human-readable answer: one bulleted block per document.
    pub fn render_answer(&self) -> String {
        self.documents
            .iter()
            .map(|s| {
                let mut out = format!("Document: '{}'", s.name);
                if s.chunk_count > 1 {
                    out.push_str(&format!(" (summarized in {} parts)", s.chunk_count));
                }
                out.push_str("\n- ");
                out.push_str(&s.summary.replace('\n', "\n- "));
                if !s.errors.is_empty() {
                    out.push_str(&format!("\n[Note: {}]", s.errors.join(" ")));
                }
                out
            })
            .collect::<Vec<_>>()
            .join("\n\n")
    }
}

fn follow_up_suggestions(documents: &[DocumentSummary]) -> Vec<String> {
    match documents {
        [] => Vec::new(),
        [only] => vec![
            format!(
                "Would you like to see a detailed breakdown of sections or clauses in '{}'?",
                only.name
            ),
            format!("Do you want to search for a specific term or clause in '{}'?", only.name),
        ],
        _ => vec![
            "Would you like to see a detailed breakdown of a specific document?".to_string(),
            "Do you want to compare two documents on a specific topic?".to_string(),
            "Would you like to search for a specific clause or keyword across all documents?".to_string(),
        ],
    }
}

/// Summarizes documents through the cache, the retry wrapper and the client.
#[derive(Clone)]
pub struct SummarizationPipeline {
    client: Arc<dyn AnalysisClient>,
    cache: Arc<dyn SummaryCache>,
    retry: RetryPolicy,
    max_chunk_chars: usize,
}

impl SummarizationPipeline {
    pub fn new(client: Arc<dyn AnalysisClient>, cache: Arc<dyn SummaryCache>) -> Self {
        Self {
            client,
            cache,
            retry: RetryPolicy::default(),
            max_chunk_chars: DEFAULT_MAX_CHUNK_CHARS,
        }
    }

    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_max_chunk_chars(mut self, max_chunk_chars: usize) -> Self {
        self.max_chunk_chars = max_chunk_chars.max(1);
        self
    }

    /// Summarize `documents` in order, reporting progress after every chunk
    /// and every document.
    pub async fn summarize(
        &self,
        documents: &[SourceDocument],
        language: Option<&str>,
        progress: &dyn ProgressSink,
    ) -> SummaryDigest {
        let total = documents.len();
        let mut completed: Vec<DocumentSummary> = Vec::with_capacity(total);

        for (i, doc) in documents.iter().enumerate() {
            let summary = self
                .summarize_document(i + 1, total, doc, language, &completed, progress)
                .await;
            completed.push(summary);
            progress
                .report(JobProgress::documents(i + 1, total).with_summaries(completed.clone()))
                .await;
        }

        info!(documents = total, "summarization finished");
        SummaryDigest::new(completed)
    }

    #[instrument(skip_all, fields(doc = %doc.name, current_doc = current_doc))]
    async fn summarize_document(
        &self,
        current_doc: usize,
        total_docs: usize,
        doc: &SourceDocument,
        language: Option<&str>,
        completed: &[DocumentSummary],
        progress: &dyn ProgressSink,
    ) -> DocumentSummary {
        if doc.text.is_empty() {
            return DocumentSummary::new(&doc.name, NO_CONTENT, 0);
        }

        let chunks = chunk_text(&doc.text, self.max_chunk_chars);
        let total_chunks = chunks.len();
        debug!(chunks = total_chunks, "document chunked");

        let mut chunk_summaries: Vec<String> = Vec::with_capacity(total_chunks);
        let mut errors: Vec<String> = Vec::new();

        for (j, chunk) in chunks.iter().enumerate() {
            match self.summarize_text(chunk.text, language).await {
                Ok(summary) => chunk_summaries.push(summary),
                Err(err) => {
                    warn!(chunk = j + 1, error = %err, "chunk summarization failed");
                    errors.push(format!("Chunk {}: Could not summarize due to an error: {err}", j + 1));
                }
            }
            progress
                .report(
                    JobProgress::documents(current_doc, total_docs)
                        .with_chunks(j + 1, total_chunks)
                        .with_summaries(completed.to_vec()),
                )
                .await;
        }

        let summary = match chunk_summaries.len() {
            0 => NO_SUMMARY.to_string(),
            1 => chunk_summaries.remove(0),
            _ => {
                let joined = chunk_summaries.join("\n\n");
                match self.summarize_text(&joined, language).await {
                    Ok(combined) => combined,
                    Err(err) => {
                        warn!(error = %err, "combining chunk summaries failed");
                        errors.push(COMBINE_FALLBACK_NOTE.to_string());
                        joined
                    }
                }
            }
        };

        DocumentSummary::new(&doc.name, summary, total_chunks).with_errors(errors)
    }

    /// One summary of `text`: cache first, then the remote service.
    async fn summarize_text(&self, text: &str, language: Option<&str>) -> Result<String, AiError> {
        let key = summary_cache_key(language, text);
        if let Some(hit) = self.cache.get(&key).await {
            debug!(%key, "summary cache hit");
            return Ok(hit);
        }

        let request = SummarizeRequest::new(text, language);
        let response = with_retry(&self.retry, || self.client.summarize(&request)).await?;
        self.cache.set(&key, &response.summary).await;
        Ok(response.summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::FakeAnalysisClient;
    use async_trait::async_trait;
    use clarity_core::{NoopCache, NoopProgress};
    use std::collections::HashMap;
    use std::sync::Mutex;

    #[derive(Default)]
    struct MapCache(Mutex<HashMap<String, String>>);

    #[async_trait]
    impl SummaryCache for MapCache {
        async fn get(&self, key: &str) -> Option<String> {
            self.0.lock().unwrap().get(key).cloned()
        }

        async fn set(&self, key: &str, value: &str) {
            self.0.lock().unwrap().insert(key.to_string(), value.to_string());
        }
    }

    #[derive(Default)]
    struct RecordingProgress(Mutex<Vec<JobProgress>>);

    #[async_trait]
    impl ProgressSink for RecordingProgress {
        async fn report(&self, update: JobProgress) {
            self.0.lock().unwrap().push(update);
        }
    }

    fn paragraphs(count: usize, len: usize) -> String {
        (0..count)
            .map(|i| ((b'a' + (i % 26) as u8) as char).to_string().repeat(len))
            .collect::<Vec<_>>()
            .join("\n\n")
    }

    fn pipeline(client: Arc<FakeAnalysisClient>) -> SummarizationPipeline {
        SummarizationPipeline::new(client, Arc::new(NoopCache)).with_retry_policy(RetryPolicy::no_retry())
    }

    #[tokio::test]
    async fn single_chunk_document_needs_no_combining_call() {
        let client = Arc::new(FakeAnalysisClient::new());
        let docs = vec![SourceDocument::new("lease.pdf", "Tenant pays rent monthly.")];

        let digest = pipeline(client.clone()).summarize(&docs, None, &NoopProgress).await;

        assert_eq!(client.summarize_calls(), 1);
        assert_eq!(digest.documents[0].chunk_count, 1);
        assert_eq!(digest.documents[0].summary, "summary of 25 chars");
        assert!(digest.documents[0].errors.is_empty());
    }

    #[tokio::test]
    async fn thirty_thousand_char_document_makes_four_calls() {
        let client = Arc::new(FakeAnalysisClient::new());
        let text = paragraphs(15, 1998);
        let docs = vec![SourceDocument::new("policy", text)];

        let digest = pipeline(client.clone())
            .with_max_chunk_chars(12_000)
            .summarize(&docs, None, &NoopProgress)
            .await;

        // Three chunk summaries plus one combining call.
        assert_eq!(client.summarize_calls(), 4);
        let inputs = client.summarize_inputs();
        assert!(inputs[..3].iter().all(|c| c.chars().count() <= 12_000));
        assert_eq!(inputs[3].matches("\n\n").count(), 2);
        assert_eq!(digest.documents[0].chunk_count, 3);
        assert!(digest.render_answer().starts_with("Document: 'policy' (summarized in 3 parts)\n- "));
    }

    #[tokio::test]
    async fn failed_chunk_is_noted_and_processing_continues() {
        let client = Arc::new(FakeAnalysisClient::new().on_summarize(|req| {
            if req.document_content.starts_with('b') {
                Err(AiError::upstream("500 Internal Server Error", "boom"))
            } else {
                Ok(crate::client::SummarizeResponse {
                    summary: "ok".to_string(),
                })
            }
        }));
        let docs = vec![SourceDocument::new("d", paragraphs(3, 10))];

        let digest = pipeline(client.clone())
            .with_max_chunk_chars(10)
            .summarize(&docs, None, &NoopProgress)
            .await;

        let doc = &digest.documents[0];
        assert_eq!(doc.chunk_count, 3);
        assert_eq!(
            doc.errors,
            vec!["Chunk 2: Could not summarize due to an error: 500 Internal Server Error: boom".to_string()]
        );
        // Two successes are combined into one summary.
        assert_eq!(doc.summary, "ok");
        assert_eq!(client.summarize_calls(), 4);
    }

    #[tokio::test]
    async fn combine_failure_falls_back_to_chunk_summaries() {
        let client = Arc::new(FakeAnalysisClient::new().on_summarize(|req| {
            if req.document_content.contains("\n\n") {
                Err(AiError::Transport("connection reset".into()))
            } else {
                Ok(crate::client::SummarizeResponse {
                    summary: format!("S{}", req.document_content.len()),
                })
            }
        }));
        let docs = vec![SourceDocument::new("d", paragraphs(2, 10))];

        let digest = pipeline(client).with_max_chunk_chars(10).summarize(&docs, None, &NoopProgress).await;

        let doc = &digest.documents[0];
        assert_eq!(doc.summary, "S10\n\nS10");
        assert_eq!(doc.errors, vec![COMBINE_FALLBACK_NOTE.to_string()]);
        assert!(digest.render_answer().contains("\n[Note: Could not generate a combined summary"));
    }

    #[tokio::test]
    async fn all_chunks_failing_yields_placeholder() {
        let client =
            Arc::new(FakeAnalysisClient::new().on_summarize(|_| Err(AiError::malformed("not json"))));
        let docs = vec![SourceDocument::new("d", "text")];

        let digest = pipeline(client).summarize(&docs, None, &NoopProgress).await;
        assert_eq!(digest.documents[0].summary, NO_SUMMARY);
        assert_eq!(digest.documents[0].errors.len(), 1);
    }

    #[tokio::test]
    async fn empty_document_gets_placeholder_without_remote_calls() {
        let client = Arc::new(FakeAnalysisClient::new());
        let docs = vec![SourceDocument::new("blank", "")];

        let digest = pipeline(client.clone()).summarize(&docs, None, &NoopProgress).await;
        assert_eq!(client.total_calls(), 0);
        assert_eq!(digest.documents[0], DocumentSummary::new("blank", NO_CONTENT, 0));
    }

    #[tokio::test]
    async fn cached_summaries_skip_the_remote_call() {
        let client = Arc::new(FakeAnalysisClient::new());
        let cache = Arc::new(MapCache::default());
        let pipeline = SummarizationPipeline::new(client.clone(), cache.clone());
        let docs = vec![SourceDocument::new("d", "same text")];

        let first = pipeline.summarize(&docs, Some("en"), &NoopProgress).await;
        let second = pipeline.summarize(&docs, Some("en"), &NoopProgress).await;
        assert_eq!(first, second);
        assert_eq!(client.summarize_calls(), 1);

        // A different language is a different artifact.
        pipeline.summarize(&docs, Some("fr"), &NoopProgress).await;
        assert_eq!(client.summarize_calls(), 2);
        assert!(cache.get(&summary_cache_key(Some("fr"), "same text")).await.is_some());
    }

    #[tokio::test]
    async fn progress_is_reported_per_chunk_and_per_document() {
        let client = Arc::new(FakeAnalysisClient::new());
        let progress = RecordingProgress::default();
        let docs = vec![
            SourceDocument::new("a", paragraphs(2, 10)),
            SourceDocument::new("b", "short"),
        ];

        pipeline(client).with_max_chunk_chars(10).summarize(&docs, None, &progress).await;

        let updates = progress.0.lock().unwrap().clone();
        let shape: Vec<_> = updates
            .iter()
            .map(|u| (u.current_doc, u.current_chunk, u.completed_summaries.as_ref().map(Vec::len)))
            .collect();
        assert_eq!(
            shape,
            vec![
                (Some(1), Some(1), Some(0)),
                (Some(1), Some(2), Some(0)),
                (Some(1), None, Some(1)),
                (Some(2), Some(1), Some(1)),
                (Some(2), None, Some(2)),
            ]
        );
        assert!(updates.iter().all(|u| u.total_docs == Some(2)));
    }

    #[test]
    fn follow_ups_depend_on_document_count() {
        let one = SummaryDigest::new(vec![DocumentSummary::new("lease.pdf", "s", 1)]);
        assert_eq!(one.follow_up_questions.len(), 2);
        assert!(one.follow_up_questions.iter().all(|q| q.contains("'lease.pdf'")));

        let many = SummaryDigest::new(vec![
            DocumentSummary::new("a", "s", 1),
            DocumentSummary::new("b", "s", 1),
        ]);
        assert_eq!(many.follow_up_questions.len(), 3);

        assert!(SummaryDigest::new(Vec::new()).follow_up_questions.is_empty());
    }

    #[test]
    fn rendered_answer_bullets_multiline_summaries() {
        let digest = SummaryDigest::new(vec![
            DocumentSummary::new("a", "line one\nline two", 1),
            DocumentSummary::new("b", "x", 2).with_errors(vec!["Chunk 2: failed.".into()]),
        ]);
        assert_eq!(
            digest.render_answer(),
            "Document: 'a'\n- line one\n- line two\n\nDocument: 'b' (summarized in 2 parts)\n- x\n[Note: Chunk 2: failed.]"
        );
    }
}
