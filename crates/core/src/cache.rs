//! Artifact cache contract.
//!
//! Backends live in the infra crate. A cache is a pure optimization: lookups
//! that fail for any reason behave like a miss, and writes are best-effort.

use async_trait::async_trait;

use crate::fingerprint::fingerprint;

/// Key-value store for previously computed summaries.
#[async_trait]
pub trait SummaryCache: Send + Sync {
    /// Look up a cached value. Backend errors are absorbed and reported as a miss.
    async fn get(&self, key: &str) -> Option<String>;

    /// Store a value. Backend errors are absorbed.
    async fn set(&self, key: &str, value: &str);
}

/// Cache key for a summary of `text` in `language`.
///
/// The language is part of the key because the same text summarized in two
/// languages yields two different artifacts.
pub fn summary_cache_key(language: Option<&str>, text: &str) -> String {
    format!(
        "summary:{}:{}",
        language.filter(|l| !l.is_empty()).unwrap_or("default"),
        fingerprint(text)
    )
}

/// Cache that never stores anything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopCache;

#[async_trait]
impl SummaryCache for NoopCache {
    async fn get(&self, _key: &str) -> Option<String> {
        None
    }

    async fn set(&self, _key: &str, _value: &str) {}
}
