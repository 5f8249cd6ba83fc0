//! Process configuration, read once from the environment at startup.

use std::net::SocketAddr;
use std::time::Duration;

use clarity_ai::gemini::{DEFAULT_API_URL, DEFAULT_EMBEDDING_MODEL, DEFAULT_MODEL};
use clarity_ai::GeminiConfig;
use clarity_core::DEFAULT_MAX_CHUNK_CHARS;
use tracing::warn;

use crate::jobs::worker::WorkerConfig;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid value for {key}: {message}")]
    Invalid { key: &'static str, message: String },
}

/// Runtime configuration for the API and worker processes.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub bind_addr: SocketAddr,
    /// Durable queue backend; in-memory when absent.
    pub queue_redis_url: Option<String>,
    /// Networked summary cache; in-memory when absent.
    pub cache_redis_url: Option<String>,
    pub redis_prefix: String,
    pub gemini_api_key: String,
    pub gemini_model: String,
    pub gemini_api_url: String,
    pub gemini_embedding_model: String,
    pub chunk_max_chars: usize,
    pub poll_interval: Duration,
    pub worker_concurrency: usize,
    /// Run a worker inside the API process.
    pub embedded_worker: bool,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([0, 0, 0, 0], 8080)),
            queue_redis_url: None,
            cache_redis_url: None,
            redis_prefix: "clarity".to_string(),
            gemini_api_key: String::new(),
            gemini_model: DEFAULT_MODEL.to_string(),
            gemini_api_url: DEFAULT_API_URL.to_string(),
            gemini_embedding_model: DEFAULT_EMBEDDING_MODEL.to_string(),
            chunk_max_chars: DEFAULT_MAX_CHUNK_CHARS,
            poll_interval: Duration::from_millis(100),
            worker_concurrency: 1,
            embedded_worker: true,
        }
    }
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary key lookup. Blank values count as unset.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        let defaults = Self::default();

        let redis_url = get("REDIS_URL");
        let gemini_api_key = get("GEMINI_API_KEY").unwrap_or_else(|| {
            warn!("GEMINI_API_KEY not set; remote analysis calls will be rejected");
            String::new()
        });

        Ok(Self {
            bind_addr: parse(&get, "CLARITY_BIND_ADDR", defaults.bind_addr)?,
            queue_redis_url: get("QUEUE_REDIS_URL").or_else(|| redis_url.clone()),
            cache_redis_url: get("CACHE_REDIS_URL").or(redis_url),
            redis_prefix: get("CLARITY_REDIS_PREFIX").unwrap_or(defaults.redis_prefix),
            gemini_api_key,
            gemini_model: get("GEMINI_MODEL").unwrap_or(defaults.gemini_model),
            gemini_api_url: get("GEMINI_API_URL").unwrap_or(defaults.gemini_api_url),
            gemini_embedding_model: get("GEMINI_EMBEDDING_MODEL").unwrap_or(defaults.gemini_embedding_model),
            chunk_max_chars: parse(&get, "CLARITY_CHUNK_MAX_CHARS", defaults.chunk_max_chars)?,
            poll_interval: Duration::from_millis(parse(
                &get,
                "CLARITY_POLL_INTERVAL_MS",
                defaults.poll_interval.as_millis() as u64,
            )?),
            worker_concurrency: parse(&get, "CLARITY_WORKER_CONCURRENCY", defaults.worker_concurrency)?,
            embedded_worker: parse(&get, "CLARITY_EMBEDDED_WORKER", defaults.embedded_worker)?,
        })
    }

    pub fn gemini(&self) -> GeminiConfig {
        let mut config = GeminiConfig::new(self.gemini_api_key.clone());
        config.api_url = self.gemini_api_url.clone();
        config.model = self.gemini_model.clone();
        config.embedding_model = self.gemini_embedding_model.clone();
        config
    }

    pub fn worker(&self, name: impl Into<String>) -> WorkerConfig {
        WorkerConfig::default()
            .with_name(name)
            .with_poll_interval(self.poll_interval)
            .with_concurrency(self.worker_concurrency)
    }
}

fn parse<T>(get: &impl Fn(&str) -> Option<String>, key: &'static str, default: T) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match get(key) {
        Some(raw) => raw.parse().map_err(|e: T::Err| ConfigError::Invalid {
            key,
            message: format!("{raw:?}: {e}"),
        }),
        None => Ok(default),
    }
}
