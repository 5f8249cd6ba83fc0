//! [`AnalysisClient`] over the Gemini Generative Language REST API.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use reqwest::header::{CONTENT_TYPE, HeaderMap, HeaderValue};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::client::{
    AnalysisClient, AnswerRequest, AnswerResponse, HumanizeRequest, HumanizeResponse, SummarizeRequest,
    SummarizeResponse,
};
use crate::error::AiError;

pub const DEFAULT_API_URL: &str = "https://generativelanguage.googleapis.com/v1beta";
pub const DEFAULT_MODEL: &str = "gemini-1.5-flash";
pub const DEFAULT_EMBEDDING_MODEL: &str = "text-embedding-004";

/// Connection settings for [`GeminiClient`].
#[derive(Debug, Clone)]
pub struct GeminiConfig {
    pub api_key: String,
    pub api_url: String,
    pub model: String,
    pub embedding_model: String,
    pub timeout: Duration,
}

impl GeminiConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            api_url: DEFAULT_API_URL.to_string(),
            model: DEFAULT_MODEL.to_string(),
            embedding_model: DEFAULT_EMBEDDING_MODEL.to_string(),
            timeout: Duration::from_secs(120),
        }
    }
}

pub struct GeminiClient {
    http: Client,
    base_url: String,
    model: String,
    embedding_model: String,
}

impl GeminiClient {
    pub fn new(config: GeminiConfig) -> Result<Self, AiError> {
        let mut headers = HeaderMap::new();
        headers.insert(
            "x-goog-api-key",
            HeaderValue::from_str(config.api_key.trim())
                .map_err(|e| AiError::InvalidInput(format!("invalid Gemini API key: {e}")))?,
        );
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        let http = Client::builder()
            .timeout(config.timeout)
            .default_headers(headers)
            .build()
            .map_err(|e| AiError::Internal(format!("failed to build Gemini HTTP client: {e}")))?;

        Ok(Self {
            http,
            base_url: config.api_url.trim_end_matches('/').to_string(),
            model: config.model,
            embedding_model: config.embedding_model,
        })
    }

    /// Run a prompt that must answer with a JSON object of type `T`.
    async fn generate<T: DeserializeOwned>(&self, prompt: String) -> Result<T, AiError> {
        let url = format!("{}/models/{}:generateContent", self.base_url, self.model);
        let body = GenerateRequest {
            contents: vec![Content {
                role: "user",
                parts: vec![Part { text: &prompt }],
            }],
            generation_config: GenerationConfig {
                response_mime_type: "application/json",
            },
        };

        debug!(model = %self.model, prompt_chars = prompt.len(), "generateContent");
        let response: GenerateResponse = self.post(&url, &body).await?;
        parse_generated(response)
    }

    async fn post<B: Serialize, R: DeserializeOwned>(&self, url: &str, body: &B) -> Result<R, AiError> {
        let resp = self
            .http
            .post(url)
            .json(body)
            .send()
            .await
            .map_err(|e| AiError::Transport(e.to_string()))?;

        let status = resp.status();
        if !status.is_success() {
            let text = resp
                .text()
                .await
                .unwrap_or_else(|_| "<body unavailable>".to_string());
            return Err(AiError::upstream(status.to_string(), text));
        }

        resp.json::<R>()
            .await
            .map_err(|e| AiError::malformed(format!("unexpected Gemini response: {e}")))
    }
}

#[async_trait]
impl AnalysisClient for GeminiClient {
    async fn summarize(&self, request: &SummarizeRequest) -> Result<SummarizeResponse, AiError> {
        self.generate(summarize_prompt(request)).await
    }

    async fn answer_question(&self, request: &AnswerRequest) -> Result<AnswerResponse, AiError> {
        self.generate(answer_prompt(request)).await
    }

    async fn humanize(&self, request: &HumanizeRequest) -> Result<HumanizeResponse, AiError> {
        self.generate(humanize_prompt(request)).await
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>, AiError> {
        let url = format!("{}/models/{}:embedContent", self.base_url, self.embedding_model);
        let body = EmbedRequest {
            model: format!("models/{}", self.embedding_model),
            content: EmbedContent {
                parts: vec![Part { text }],
            },
        };
        let response: EmbedResponse = self.post(&url, &body).await?;
        Ok(response.embedding.values)
    }

    async fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>, AiError> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        let url = format!("{}/models/{}:batchEmbedContents", self.base_url, self.embedding_model);
        let body = BatchEmbedRequest {
            requests: texts
                .iter()
                .map(|&text| EmbedRequest {
                    model: format!("models/{}", self.embedding_model),
                    content: EmbedContent {
                        parts: vec![Part { text }],
                    },
                })
                .collect(),
        };
        let response: BatchEmbedResponse = self.post(&url, &body).await?;
        batch_values(response, texts.len())
    }
}

fn batch_values(response: BatchEmbedResponse, expected: usize) -> Result<Vec<Vec<f32>>, AiError> {
    if response.embeddings.len() != expected {
        return Err(AiError::malformed(format!(
            "expected {expected} embeddings, got {}",
            response.embeddings.len()
        )));
    }
    Ok(response.embeddings.into_iter().map(|e| e.values).collect())
}

fn language_clause(language: Option<&str>) -> String {
    match language.filter(|l| !l.is_empty()) {
        Some(lang) => format!("All responses MUST be written in the language with code \"{lang}\".\n\n"),
        None => String::new(),
    }
}

fn summarize_prompt(request: &SummarizeRequest) -> String {
    format!(
        "{}You are a legal assistant. Review the following legal document and provide a concise \
         summary of its purpose, parties, key obligations, rights, and notable risks.\n\n\
         Respond with a JSON object: {{\"summary\": string}}.\n\n\
         Document:\n{}",
        language_clause(request.language.as_deref()),
        request.document_content
    )
}

fn answer_prompt(request: &AnswerRequest) -> String {
    let mut history = String::new();
    for turn in &request.history {
        history.push_str(&format!("Q: {}\nA: {}\n", turn.question, turn.answer));
    }

    format!(
        "{}You are a legal policy assistant. Answer the user's question using ONLY the provided \
         document. Do not use external knowledge. If the answer is not in the document, say that it \
         cannot be found in the provided document.\n\n\
         Respond with a JSON object: {{\"answer\": string, \"feedback\": string, \
         \"citations\": string[], \"followUpQuestions\": string[], \
         \"coverageStatus\": \"yes\" | \"no\" | \"not mentioned\" (optional), \"summary\": string (optional)}}.\n\n\
         Conversation so far:\n{}\n\
         Question: {}\n\n\
         Document:\n{}",
        language_clause(request.language.as_deref()),
        if history.is_empty() { "(none)\n" } else { history.as_str() },
        request.question,
        request.document_content
    )
}

fn humanize_prompt(request: &HumanizeRequest) -> String {
    format!(
        "Rewrite the following text so it reads naturally to a non-lawyer. Keep every fact, \
         keep the original language, and do not add information.\n\n\
         Respond with a JSON object: {{\"humanizedText\": string}}.\n\n\
         Text:\n{}",
        request.raw_text
    )
}

/// Extract and decode the JSON document the model produced.
fn parse_generated<T: DeserializeOwned>(response: GenerateResponse) -> Result<T, AiError> {
    let text = response
        .candidates
        .into_iter()
        .next()
        .and_then(|c| c.content)
        .map(|c| c.parts.into_iter().filter_map(|p| p.text).collect::<String>())
        .filter(|t| !t.trim().is_empty())
        .ok_or_else(|| AiError::malformed("response has no text candidate"))?;

    serde_json::from_str(strip_code_fence(&text))
        .map_err(|e| AiError::malformed(format!("model output does not match schema: {e}")))
}

/// Models occasionally wrap JSON output in a Markdown code fence.
fn strip_code_fence(text: &str) -> &str {
    let trimmed = text.trim();
    trimmed
        .strip_prefix("```json")
        .or_else(|| trimmed.strip_prefix("```"))
        .and_then(|rest| rest.strip_suffix("```"))
        .map(str::trim)
        .unwrap_or(trimmed)
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateRequest<'a> {
    contents: Vec<Content<'a>>,
    generation_config: GenerationConfig,
}

#[derive(Serialize)]
struct Content<'a> {
    role: &'a str,
    parts: Vec<Part<'a>>,
}

#[derive(Serialize)]
struct Part<'a> {
    text: &'a str,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    response_mime_type: &'static str,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<CandidatePart>,
}

#[derive(Debug, Deserialize)]
struct CandidatePart {
    text: Option<String>,
}

#[derive(Serialize)]
struct EmbedRequest<'a> {
    model: String,
    content: EmbedContent<'a>,
}

#[derive(Serialize)]
struct EmbedContent<'a> {
    parts: Vec<Part<'a>>,
}

#[derive(Debug, Deserialize)]
struct EmbedResponse {
    embedding: EmbeddingValues,
}

#[derive(Debug, Deserialize)]
struct EmbeddingValues {
    values: Vec<f32>,
}

#[derive(Serialize)]
struct BatchEmbedRequest<'a> {
    requests: Vec<EmbedRequest<'a>>,
}

#[derive(Debug, Deserialize)]
struct BatchEmbedResponse {
    #[serde(default)]
    embeddings: Vec<EmbeddingValues>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn generated(text: &str) -> GenerateResponse {
        serde_json::from_value(json!({
            "candidates": [{"content": {"role": "model", "parts": [{"text": text}]}}]
        }))
        .unwrap()
    }

    #[test]
    fn parses_json_candidate_into_typed_response() {
        let out: SummarizeResponse = parse_generated(generated(r#"{"summary": "Lease for 12 months."}"#)).unwrap();
        assert_eq!(out.summary, "Lease for 12 months.");
    }

    #[test]
    fn accepts_fenced_json() {
        let out: HumanizeResponse =
            parse_generated(generated("```json\n{\"humanizedText\": \"plain words\"}\n```")).unwrap();
        assert_eq!(out.humanized_text, "plain words");
    }

    #[test]
    fn rejects_missing_or_mismatched_output() {
        let empty: GenerateResponse = serde_json::from_value(json!({"candidates": []})).unwrap();
        assert!(matches!(
            parse_generated::<SummarizeResponse>(empty),
            Err(AiError::MalformedResponse(_))
        ));
        assert!(matches!(
            parse_generated::<SummarizeResponse>(generated(r#"{"text": "no summary field"}"#)),
            Err(AiError::MalformedResponse(_))
        ));
    }

    #[test]
    fn prompts_carry_language_and_history() {
        let prompt = answer_prompt(&AnswerRequest {
            question: "Is flood damage covered?".into(),
            document_content: "Clause 7: floods are excluded.".into(),
            history: vec![crate::client::ConversationTurn {
                question: "Who is insured?".into(),
                answer: "The tenant.".into(),
            }],
            language: Some("es".into()),
        });
        assert!(prompt.starts_with("All responses MUST be written in the language with code \"es\""));
        assert!(prompt.contains("Q: Who is insured?\nA: The tenant."));
        assert!(prompt.contains("Clause 7: floods are excluded."));

        let prompt = summarize_prompt(&SummarizeRequest::new("text", None));
        assert!(prompt.starts_with("You are a legal assistant."));
    }

    #[test]
    fn embedding_response_decodes_values() {
        let resp: EmbedResponse = serde_json::from_value(json!({"embedding": {"values": [0.5, -1.0]}})).unwrap();
        assert_eq!(resp.embedding.values, vec![0.5, -1.0]);
    }

    #[test]
    fn batch_embedding_keeps_order_and_checks_count() {
        let resp: BatchEmbedResponse = serde_json::from_value(json!({
            "embeddings": [{"values": [1.0]}, {"values": [2.0, 3.0]}]
        }))
        .unwrap();
        assert_eq!(batch_values(resp, 2).unwrap(), vec![vec![1.0], vec![2.0, 3.0]]);

        let short: BatchEmbedResponse = serde_json::from_value(json!({"embeddings": [{"values": [1.0]}]})).unwrap();
        assert!(matches!(batch_values(short, 2), Err(AiError::MalformedResponse(_))));

        let body = serde_json::to_value(BatchEmbedRequest {
            requests: vec![EmbedRequest {
                model: "models/text-embedding-004".to_string(),
                content: EmbedContent {
                    parts: vec![Part { text: "clause" }],
                },
            }],
        })
        .unwrap();
        assert_eq!(body["requests"][0]["content"]["parts"][0]["text"], "clause");
    }
}
