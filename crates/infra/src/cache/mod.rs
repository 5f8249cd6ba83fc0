//! Summary cache backends.

pub mod in_memory;
#[cfg(feature = "redis")]
pub mod redis_cache;

use std::sync::Arc;

use clarity_core::SummaryCache;
use tracing::info;

use crate::config::AppConfig;

pub use in_memory::InMemorySummaryCache;
#[cfg(feature = "redis")]
pub use redis_cache::RedisSummaryCache;

/// Open the summary cache selected by `config`.
///
/// Never fails: an unreachable Redis server degrades to the in-memory cache,
/// since the cache only ever saves work.
pub async fn open_summary_cache(config: &AppConfig) -> Arc<dyn SummaryCache> {
    let Some(url) = config.cache_redis_url.as_deref() else {
        info!("using in-memory summary cache");
        return Arc::new(InMemorySummaryCache::new());
    };

    #[cfg(feature = "redis")]
    {
        match RedisSummaryCache::connect(url).await {
            Ok(cache) => {
                info!("using Redis summary cache");
                Arc::new(cache)
            }
            Err(e) => {
                tracing::warn!(error = %e, "summary cache Redis unavailable, using in-memory cache");
                Arc::new(InMemorySummaryCache::new())
            }
        }
    }
    #[cfg(not(feature = "redis"))]
    {
        let _ = url;
        tracing::warn!("cache Redis URL set but redis feature not enabled, using in-memory cache");
        Arc::new(InMemorySummaryCache::new())
    }
}
