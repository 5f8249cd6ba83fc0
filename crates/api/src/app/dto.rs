use serde::{Deserialize, Serialize};

use clarity_ai::{ConversationTurn, QaRequest};

// -------------------------
// Request DTOs
// -------------------------

/// Body of `POST /api/submit-qa-job`.
///
/// Fields are optional here so that a missing field is reported as a
/// validation error rather than a deserialization rejection.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitQaJobRequest {
    #[serde(default)]
    pub document_content: Option<String>,
    #[serde(default)]
    pub question: Option<String>,
    #[serde(default)]
    pub history: Vec<ConversationTurn>,
    #[serde(default)]
    pub language: Option<String>,
}

impl From<SubmitQaJobRequest> for QaRequest {
    fn from(body: SubmitQaJobRequest) -> Self {
        let mut request = QaRequest::new(
            body.document_content.unwrap_or_default(),
            body.question.unwrap_or_default(),
        )
        .with_history(body.history);
        request.language = body.language;
        request
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobStatusQuery {
    pub job_id: Option<String>,
}

// -------------------------
// Response DTOs
// -------------------------

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitQaJobResponse {
    pub job_id: String,
}
