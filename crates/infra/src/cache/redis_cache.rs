//! Redis-backed summary cache with a process-local fallback.

use async_trait::async_trait;
use redis::RedisResult;
use redis::aio::MultiplexedConnection;
use tracing::warn;

use clarity_core::SummaryCache;

use super::in_memory::InMemorySummaryCache;

/// Summary cache stored in Redis (`GET`/`SET`).
///
/// Any Redis error is logged and the operation is served by the in-process
/// fallback map instead; the cache never reports a failure to its caller.
pub struct RedisSummaryCache {
    conn: MultiplexedConnection,
    fallback: InMemorySummaryCache,
}

impl RedisSummaryCache {
    pub async fn connect(redis_url: &str) -> RedisResult<Self> {
        let client = redis::Client::open(redis_url)?;
        let conn = client.get_multiplexed_async_connection().await?;
        Ok(Self {
            conn,
            fallback: InMemorySummaryCache::new(),
        })
    }
}

fn resolve_get(fallback: &InMemorySummaryCache, key: &str, found: RedisResult<Option<String>>) -> Option<String> {
    match found {
        Ok(Some(value)) => Some(value),
        // Values written while Redis was unavailable only exist locally.
        Ok(None) => fallback.get_sync(key),
        Err(e) => {
            warn!(%key, error = %e, "summary cache GET failed, using in-memory fallback");
            fallback.get_sync(key)
        }
    }
}

fn resolve_set(fallback: &InMemorySummaryCache, key: &str, value: &str, stored: RedisResult<()>) {
    if let Err(e) = stored {
        warn!(%key, error = %e, "summary cache SET failed, using in-memory fallback");
        fallback.set_sync(key, value);
    }
}

#[async_trait]
impl SummaryCache for RedisSummaryCache {
    async fn get(&self, key: &str) -> Option<String> {
        let mut conn = self.conn.clone();
        let found = redis::cmd("GET").arg(key).query_async(&mut conn).await;
        resolve_get(&self.fallback, key, found)
    }

    async fn set(&self, key: &str, value: &str) {
        let mut conn = self.conn.clone();
        let stored = redis::cmd("SET").arg(key).arg(value).query_async(&mut conn).await;
        resolve_set(&self.fallback, key, value, stored);
    }
}
