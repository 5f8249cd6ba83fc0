//! Contract of the remote language-model service.
//!
//! Request/response types mirror the JSON the model is asked to produce;
//! responses that do not fit them are rejected as malformed.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::AiError;

/// A previous question/answer exchange, passed to the model as context.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversationTurn {
    pub question: String,
    pub answer: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SummarizeRequest {
    pub document_content: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
}

impl SummarizeRequest {
    pub fn new(document_content: impl Into<String>, language: Option<&str>) -> Self {
        Self {
            document_content: document_content.into(),
            language: language.map(str::to_string),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SummarizeResponse {
    pub summary: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnswerRequest {
    pub question: String,
    pub document_content: String,
    pub history: Vec<ConversationTurn>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
}

/// Whether the document covers the scenario asked about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CoverageStatus {
    #[serde(rename = "yes")]
    Yes,
    #[serde(rename = "no")]
    No,
    #[serde(rename = "not mentioned")]
    NotMentioned,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnswerResponse {
    pub answer: String,
    pub feedback: String,
    #[serde(default)]
    pub citations: Vec<String>,
    #[serde(default)]
    pub follow_up_questions: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub coverage_status: Option<CoverageStatus>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HumanizeRequest {
    pub raw_text: String,
}

impl HumanizeRequest {
    pub fn new(raw_text: impl Into<String>) -> Self {
        Self {
            raw_text: raw_text.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HumanizeResponse {
    pub humanized_text: String,
}

/// Remote analysis operations used by the pipelines.
///
/// Implementations report HTTP-level failures as [`AiError::Upstream`] so the
/// retry wrapper can tell overload apart from permanent errors.
#[async_trait]
pub trait AnalysisClient: Send + Sync {
    async fn summarize(&self, request: &SummarizeRequest) -> Result<SummarizeResponse, AiError>;

    async fn answer_question(&self, request: &AnswerRequest) -> Result<AnswerResponse, AiError>;

    /// Rewrite model output into plain, readable prose.
    async fn humanize(&self, request: &HumanizeRequest) -> Result<HumanizeResponse, AiError>;

    /// Embedding vector for `text`.
    async fn embed(&self, text: &str) -> Result<Vec<f32>, AiError>;

    /// Embedding vectors for `texts`, in input order.
    ///
    /// The default embeds one text at a time; clients with a batch endpoint
    /// override it with a single request.
    async fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>, AiError> {
        let mut out = Vec::with_capacity(texts.len());
        for text in texts {
            out.push(self.embed(text).await?);
        }
        Ok(out)
    }
}
