use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;

use clarity_core::SummaryCache;

/// Process-local summary cache. Entries are never evicted.
#[derive(Debug, Default)]
pub struct InMemorySummaryCache {
    entries: RwLock<HashMap<String, String>>,
}

impl InMemorySummaryCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.read().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub(crate) fn get_sync(&self, key: &str) -> Option<String> {
        self.entries.read().unwrap().get(key).cloned()
    }

    pub(crate) fn set_sync(&self, key: &str, value: &str) {
        self.entries
            .write()
            .unwrap()
            .insert(key.to_string(), value.to_string());
    }
}

#[async_trait]
impl SummaryCache for InMemorySummaryCache {
    async fn get(&self, key: &str) -> Option<String> {
        self.get_sync(key)
    }

    async fn set(&self, key: &str, value: &str) {
        self.set_sync(key, value);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clarity_core::{fingerprint, summary_cache_key};

    #[tokio::test]
    async fn set_then_get_returns_value() {
        let cache = InMemorySummaryCache::new();
        let key = summary_cache_key(None, "Clause 1: rent is due monthly.");

        cache.set(&key, "Monthly rent.").await;
        assert_eq!(cache.get(&key).await.as_deref(), Some("Monthly rent."));
    }

    #[tokio::test]
    async fn unset_fingerprint_is_a_miss() {
        let cache = InMemorySummaryCache::new();
        assert_eq!(cache.get(&fingerprint("never stored")).await, None);
        assert!(cache.is_empty());
    }

    #[tokio::test]
    async fn last_write_wins() {
        let cache = InMemorySummaryCache::new();
        cache.set("k", "first").await;
        cache.set("k", "second").await;
        assert_eq!(cache.get("k").await.as_deref(), Some("second"));
        assert_eq!(cache.len(), 1);
    }
}
