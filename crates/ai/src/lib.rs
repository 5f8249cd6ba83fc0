//! `clarity-ai`
//!
//! **Responsibility:** everything that talks to the remote language model.
//!
//! - `client`: the analysis contract (summarize, answer, humanize, embed)
//! - `gemini`: HTTP implementation of that contract
//! - `retry`: backoff for overloaded/rate-limited upstreams
//! - `summarize` / `qa`: the document pipelines run by job handlers
//!
//! Storage and job plumbing live in `clarity-infra`; pipelines only see the
//! cache and progress contracts from `clarity-core`.

pub mod client;
pub mod documents;
pub mod error;
pub mod gemini;
pub mod qa;
pub mod retry;
pub mod summarize;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use client::{
    AnalysisClient, AnswerRequest, AnswerResponse, ConversationTurn, CoverageStatus, HumanizeRequest,
    HumanizeResponse, SummarizeRequest, SummarizeResponse,
};
pub use documents::{SourceDocument, is_broad_summary_question, parse_document_content};
pub use error::{AiError, Retryable, is_transient_message};
pub use gemini::{GeminiClient, GeminiConfig};
pub use qa::{DocumentAnswer, DocumentAnswerStatus, QaAnswer, QaPipeline, QaRequest};
pub use retry::{RetryPolicy, with_retry};
pub use summarize::{SummarizationPipeline, SummaryDigest};
