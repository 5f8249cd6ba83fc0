//! Scriptable in-process [`AnalysisClient`] for tests.

use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;

use crate::client::{
    AnalysisClient, AnswerRequest, AnswerResponse, HumanizeRequest, HumanizeResponse, SummarizeRequest,
    SummarizeResponse,
};
use crate::error::AiError;

type SummarizeFn = dyn Fn(&SummarizeRequest) -> Result<SummarizeResponse, AiError> + Send + Sync;
type AnswerFn = dyn Fn(&AnswerRequest) -> Result<AnswerResponse, AiError> + Send + Sync;
type HumanizeFn = dyn Fn(&HumanizeRequest) -> Result<HumanizeResponse, AiError> + Send + Sync;

/// Fake client with per-operation behaviour and call accounting.
///
/// Defaults: `summarize` answers `summary of <N> chars`, `answer_question`
/// echoes the question, `humanize` returns its input, and `embed` /
/// `embed_batch` return a two-element vector derived from the text length.
pub struct FakeAnalysisClient {
    on_summarize: Box<SummarizeFn>,
    on_answer: Box<AnswerFn>,
    on_humanize: Box<HumanizeFn>,
    summarize_inputs: Mutex<Vec<String>>,
    answer_calls: AtomicUsize,
    humanize_calls: AtomicUsize,
    embed_calls: AtomicUsize,
    embed_batch_calls: AtomicUsize,
    fail_embed_batch: bool,
}

impl Default for FakeAnalysisClient {
    fn default() -> Self {
        Self {
            on_summarize: Box::new(|req| {
                Ok(SummarizeResponse {
                    summary: format!("summary of {} chars", req.document_content.chars().count()),
                })
            }),
            on_answer: Box::new(|req| {
                Ok(AnswerResponse {
                    answer: format!("answer to: {}", req.question),
                    feedback: "looks fine".to_string(),
                    citations: Vec::new(),
                    follow_up_questions: Vec::new(),
                    coverage_status: None,
                    summary: None,
                })
            }),
            on_humanize: Box::new(|req| {
                Ok(HumanizeResponse {
                    humanized_text: req.raw_text.clone(),
                })
            }),
            summarize_inputs: Mutex::new(Vec::new()),
            answer_calls: AtomicUsize::new(0),
            humanize_calls: AtomicUsize::new(0),
            embed_calls: AtomicUsize::new(0),
            embed_batch_calls: AtomicUsize::new(0),
            fail_embed_batch: false,
        }
    }
}

impl FakeAnalysisClient {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on_summarize(
        mut self,
        f: impl Fn(&SummarizeRequest) -> Result<SummarizeResponse, AiError> + Send + Sync + 'static,
    ) -> Self {
        self.on_summarize = Box::new(f);
        self
    }

    pub fn on_answer(
        mut self,
        f: impl Fn(&AnswerRequest) -> Result<AnswerResponse, AiError> + Send + Sync + 'static,
    ) -> Self {
        self.on_answer = Box::new(f);
        self
    }

    pub fn on_humanize(
        mut self,
        f: impl Fn(&HumanizeRequest) -> Result<HumanizeResponse, AiError> + Send + Sync + 'static,
    ) -> Self {
        self.on_humanize = Box::new(f);
        self
    }

    /// Make every `embed_batch` call fail; single `embed` calls still succeed.
    pub fn failing_embed_batch(mut self) -> Self {
        self.fail_embed_batch = true;
        self
    }

    /// Inputs of every `summarize` call, in call order.
    pub fn summarize_inputs(&self) -> Vec<String> {
        self.summarize_inputs.lock().unwrap().clone()
    }

    pub fn summarize_calls(&self) -> usize {
        self.summarize_inputs.lock().unwrap().len()
    }

    pub fn answer_calls(&self) -> usize {
        self.answer_calls.load(Ordering::SeqCst)
    }

    pub fn humanize_calls(&self) -> usize {
        self.humanize_calls.load(Ordering::SeqCst)
    }

    pub fn embed_calls(&self) -> usize {
        self.embed_calls.load(Ordering::SeqCst)
    }

    pub fn embed_batch_calls(&self) -> usize {
        self.embed_batch_calls.load(Ordering::SeqCst)
    }

    /// Total number of remote calls of any kind.
    pub fn total_calls(&self) -> usize {
        self.summarize_calls()
            + self.answer_calls()
            + self.humanize_calls()
            + self.embed_calls()
            + self.embed_batch_calls()
    }
}

#[async_trait]
impl AnalysisClient for FakeAnalysisClient {
    async fn summarize(&self, request: &SummarizeRequest) -> Result<SummarizeResponse, AiError> {
        self.summarize_inputs
            .lock()
            .unwrap()
            .push(request.document_content.clone());
        (self.on_summarize)(request)
    }

    async fn answer_question(&self, request: &AnswerRequest) -> Result<AnswerResponse, AiError> {
        self.answer_calls.fetch_add(1, Ordering::SeqCst);
        (self.on_answer)(request)
    }

    async fn humanize(&self, request: &HumanizeRequest) -> Result<HumanizeResponse, AiError> {
        self.humanize_calls.fetch_add(1, Ordering::SeqCst);
        (self.on_humanize)(request)
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>, AiError> {
        self.embed_calls.fetch_add(1, Ordering::SeqCst);
        Ok(fake_embedding(text))
    }

    async fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>, AiError> {
        self.embed_batch_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_embed_batch {
            return Err(AiError::upstream("400 Bad Request", "batch rejected"));
        }
        Ok(texts.iter().map(|t| fake_embedding(t)).collect())
    }
}

fn fake_embedding(text: &str) -> Vec<f32> {
    vec![text.chars().count() as f32, 1.0]
}
