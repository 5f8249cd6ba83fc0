//! Question answering over uploaded documents.
//!
//! Broad "summarize everything" questions are routed to the summarization
//! pipeline; any other question is answered per document.

use std::sync::Arc;

use clarity_core::{CoreError, CoreResult, JobProgress, ProgressSink, SummaryCache};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::client::{AnalysisClient, AnswerRequest, ConversationTurn, HumanizeRequest};
use crate::documents::{SourceDocument, is_broad_summary_question, parse_document_content};
use crate::error::AiError;
use crate::retry::{RetryPolicy, with_retry};
use crate::summarize::{NO_CONTENT, SUMMARY_FEEDBACK, SummarizationPipeline};

pub const DOCUMENT_ERROR_ANSWER: &str = "An error occurred while processing this document.";

const NOT_FOUND_MARKER: &str = "cannot be found in the provided document";
const EMPTY_FEEDBACK: &str = "no feedback available.";

/// Payload of a Q&A job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QaRequest {
    pub document_content: String,
    pub question: String,
    #[serde(default)]
    pub history: Vec<ConversationTurn>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
}

impl QaRequest {
    pub fn new(document_content: impl Into<String>, question: impl Into<String>) -> Self {
        Self {
            document_content: document_content.into(),
            question: question.into(),
            history: Vec::new(),
            language: None,
        }
    }

    pub fn with_language(mut self, language: impl Into<String>) -> Self {
        self.language = Some(language.into());
        self
    }

    pub fn with_history(mut self, history: Vec<ConversationTurn>) -> Self {
        self.history = history;
        self
    }

    /// Both the content and the question must be non-blank.
    pub fn validate(&self) -> CoreResult<()> {
        if self.document_content.trim().is_empty() || self.question.trim().is_empty() {
            return Err(CoreError::validation(
                "Missing required fields: documentContent and question.",
            ));
        }
        Ok(())
    }

    fn language(&self) -> Option<&str> {
        self.language.as_deref().filter(|l| !l.is_empty())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentAnswerStatus {
    Answered,
    NotFound,
    Error,
}

/// Answer for one document of the upload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentAnswer {
    pub name: String,
    pub answer: String,
    pub feedback: String,
    pub citations: Vec<String>,
    pub follow_up_questions: Vec<String>,
    pub status: DocumentAnswerStatus,
}

impl DocumentAnswer {
    fn placeholder(name: &str, answer: &str, status: DocumentAnswerStatus) -> Self {
        Self {
            name: name.to_string(),
            answer: answer.to_string(),
            feedback: String::new(),
            citations: Vec::new(),
            follow_up_questions: Vec::new(),
            status,
        }
    }
}

/// Result of a Q&A job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QaAnswer {
    pub answer: String,
    pub feedback: String,
    pub citations: Vec<String>,
    pub follow_up_questions: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub per_document: Vec<DocumentAnswer>,
}

pub struct QaPipeline {
    client: Arc<dyn AnalysisClient>,
    summarizer: SummarizationPipeline,
    retry: RetryPolicy,
}

impl QaPipeline {
    pub fn new(client: Arc<dyn AnalysisClient>, cache: Arc<dyn SummaryCache>) -> Self {
        Self {
            summarizer: SummarizationPipeline::new(client.clone(), cache),
            client,
            retry: RetryPolicy::default(),
        }
    }

    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self.summarizer = self.summarizer.with_retry_policy(retry);
        self
    }

    pub fn with_max_chunk_chars(mut self, max_chunk_chars: usize) -> Self {
        self.summarizer = self.summarizer.with_max_chunk_chars(max_chunk_chars);
        self
    }

    /// Answer `request`. Per-document failures are reported inside the answer,
    /// so this never fails as a whole.
    pub async fn answer(&self, request: &QaRequest, progress: &dyn ProgressSink) -> QaAnswer {
        let documents = parse_document_content(&request.document_content);

        if is_broad_summary_question(&request.question) {
            info!(documents = documents.len(), "answering with document summaries");
            let digest = self
                .summarizer
                .summarize(&documents, request.language(), progress)
                .await;
            return QaAnswer {
                answer: digest.render_answer(),
                feedback: SUMMARY_FEEDBACK.to_string(),
                citations: Vec::new(),
                follow_up_questions: digest.follow_up_questions,
                per_document: Vec::new(),
            };
        }

        let total = documents.len();
        let mut per_document = Vec::with_capacity(total);
        for (i, doc) in documents.iter().enumerate() {
            per_document.push(self.answer_document(doc, request).await);
            progress.report(JobProgress::documents(i + 1, total)).await;
        }

        combine(per_document)
    }

    async fn answer_document(&self, doc: &SourceDocument, request: &QaRequest) -> DocumentAnswer {
        if doc.text.is_empty() {
            return DocumentAnswer::placeholder(&doc.name, NO_CONTENT, DocumentAnswerStatus::NotFound);
        }

        match self.ask(doc, request).await {
            Ok(answer) => answer,
            Err(err) => {
                warn!(doc = %doc.name, error = %err, "document question failed");
                DocumentAnswer::placeholder(&doc.name, DOCUMENT_ERROR_ANSWER, DocumentAnswerStatus::Error)
            }
        }
    }

    async fn ask(&self, doc: &SourceDocument, request: &QaRequest) -> Result<DocumentAnswer, AiError> {
        let question = AnswerRequest {
            question: request.question.clone(),
            document_content: doc.text.clone(),
            history: request.history.clone(),
            language: request.language().map(str::to_string),
        };
        let qa = with_retry(&self.retry, || self.client.answer_question(&question)).await?;

        let answer_text = HumanizeRequest::new(&qa.answer);
        let feedback_text = HumanizeRequest::new(&qa.feedback);
        let (answer, feedback) = tokio::try_join!(
            with_retry(&self.retry, || self.client.humanize(&answer_text)),
            with_retry(&self.retry, || self.client.humanize(&feedback_text)),
        )?;

        let not_found = qa.answer.trim().to_lowercase().contains(NOT_FOUND_MARKER);
        Ok(DocumentAnswer {
            name: doc.name.clone(),
            answer: answer.humanized_text,
            feedback: feedback.humanized_text,
            citations: qa.citations,
            follow_up_questions: qa.follow_up_questions,
            status: if not_found {
                DocumentAnswerStatus::NotFound
            } else {
                DocumentAnswerStatus::Answered
            },
        })
    }
}

fn combine(per_document: Vec<DocumentAnswer>) -> QaAnswer {
    let answer = per_document
        .iter()
        .map(|d| format!("Document: '{}'\n- {}", d.name, d.answer))
        .collect::<Vec<_>>()
        .join("\n\n");

    let feedback = per_document
        .iter()
        .filter(|d| {
            let f = d.feedback.trim();
            !f.is_empty() && f.to_lowercase() != EMPTY_FEEDBACK
        })
        .map(|d| format!("Document: '{}'\n{}", d.name, d.feedback))
        .collect::<Vec<_>>()
        .join("\n\n");

    QaAnswer {
        answer,
        feedback,
        citations: Vec::new(),
        follow_up_questions: Vec::new(),
        per_document,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::{AnswerResponse, HumanizeResponse};
    use crate::testing::FakeAnalysisClient;
    use clarity_core::{NoopCache, NoopProgress};

    fn pipeline(client: Arc<FakeAnalysisClient>) -> QaPipeline {
        QaPipeline::new(client, Arc::new(NoopCache)).with_retry_policy(RetryPolicy::no_retry())
    }

    fn answer(text: &str, feedback: &str) -> AnswerResponse {
        AnswerResponse {
            answer: text.to_string(),
            feedback: feedback.to_string(),
            citations: vec!["Clause 1".to_string()],
            follow_up_questions: Vec::new(),
            coverage_status: None,
            summary: None,
        }
    }

    const TWO_DOCS: &str = "Document: lease\n\nRent is due monthly.\n\n---\n\nDocument: policy\n\nFloods are excluded.";

    #[test]
    fn validation_requires_content_and_question() {
        assert!(QaRequest::new("text", "q?").validate().is_ok());
        assert!(QaRequest::new("  ", "q?").validate().is_err());
        assert!(QaRequest::new("text", "").validate().is_err());
    }

    #[test]
    fn request_deserializes_with_optional_fields_missing() {
        let req: QaRequest =
            serde_json::from_str(r#"{"documentContent": "d", "question": "q"}"#).unwrap();
        assert!(req.history.is_empty());
        assert_eq!(req.language, None);
    }

    #[tokio::test]
    async fn broad_question_returns_rendered_summaries() {
        let client = Arc::new(FakeAnalysisClient::new());
        let request = QaRequest::new(TWO_DOCS, "Please summarize all documents");

        let out = pipeline(client.clone()).answer(&request, &NoopProgress).await;

        assert_eq!(client.answer_calls(), 0);
        assert_eq!(client.summarize_calls(), 2);
        assert!(out.answer.starts_with("Document: 'lease'\n- summary of"));
        assert_eq!(out.feedback, SUMMARY_FEEDBACK);
        assert_eq!(out.follow_up_questions.len(), 3);
        assert!(out.per_document.is_empty());
    }

    #[tokio::test]
    async fn specific_question_is_answered_per_document() {
        let client = Arc::new(FakeAnalysisClient::new().on_answer(|req| {
            if req.document_content.contains("Floods") {
                Ok(answer("The answer cannot be found in the provided document.", "No feedback available."))
            } else {
                Ok(answer("Rent is monthly.", "Clause is clear."))
            }
        }));
        let request = QaRequest::new(TWO_DOCS, "When is rent due?");

        let out = pipeline(client.clone()).answer(&request, &NoopProgress).await;

        assert_eq!(client.answer_calls(), 2);
        assert_eq!(client.humanize_calls(), 4);
        assert_eq!(out.per_document[0].status, DocumentAnswerStatus::Answered);
        assert_eq!(out.per_document[0].citations, vec!["Clause 1".to_string()]);
        assert_eq!(out.per_document[1].status, DocumentAnswerStatus::NotFound);
        assert_eq!(
            out.answer,
            "Document: 'lease'\n- Rent is monthly.\n\nDocument: 'policy'\n- The answer cannot be found in the provided document."
        );
        // "No feedback available." is filtered out of the combined feedback.
        assert_eq!(out.feedback, "Document: 'lease'\nClause is clear.");
    }

    #[tokio::test]
    async fn failing_document_is_marked_error_and_others_still_answered() {
        let client = FakeAnalysisClient::new()
            .on_answer(|req| Ok(answer(&format!("about {}", req.document_content), "fine")))
            .on_humanize(|req| {
                if req.raw_text.contains("policy") {
                    Err(AiError::upstream("400 Bad Request", "rejected"))
                } else {
                    Ok(HumanizeResponse {
                        humanized_text: req.raw_text.clone(),
                    })
                }
            });
        let client = Arc::new(client);
        let request = QaRequest::new(
            "Document: lease\n\nlease text\n\n---\n\nDocument: p\n\npolicy text",
            "Who signs?",
        );

        let out = pipeline(client).answer(&request, &NoopProgress).await;

        assert_eq!(out.per_document[0].status, DocumentAnswerStatus::Answered);
        assert_eq!(out.per_document[1].status, DocumentAnswerStatus::Error);
        assert_eq!(out.per_document[1].answer, DOCUMENT_ERROR_ANSWER);
        assert!(out.per_document[1].feedback.is_empty());
    }

    #[tokio::test]
    async fn empty_document_is_not_found_without_remote_calls() {
        let client = Arc::new(FakeAnalysisClient::new());
        let request = QaRequest::new("Document: empty\n\n", "Who signs?");

        let out = pipeline(client.clone()).answer(&request, &NoopProgress).await;

        assert_eq!(client.total_calls(), 0);
        assert_eq!(out.per_document[0].status, DocumentAnswerStatus::NotFound);
        assert_eq!(out.per_document[0].answer, NO_CONTENT);
    }

    #[test]
    fn per_document_is_omitted_from_json_when_empty() {
        let out = combine(Vec::new());
        let body = serde_json::to_value(&out).unwrap();
        assert!(body.get("perDocument").is_none());
        assert_eq!(body["followUpQuestions"], serde_json::json!([]));
    }
}
