use async_trait::async_trait;
use redis::aio::MultiplexedConnection;

use clarity_core::EmbeddingRecord;

use super::{EmbeddingError, EmbeddingStore, embedding_key};

/// Embedding lists stored with `RPUSH`/`LRANGE`/`DEL`.
#[derive(Clone)]
pub struct RedisEmbeddingStore {
    conn: MultiplexedConnection,
}

impl RedisEmbeddingStore {
    pub async fn connect(redis_url: &str) -> Result<Self, EmbeddingError> {
        let client = redis::Client::open(redis_url).map_err(|e| EmbeddingError::Storage(e.to_string()))?;
        let conn = client
            .get_multiplexed_async_connection()
            .await
            .map_err(|e| EmbeddingError::Storage(e.to_string()))?;
        Ok(Self { conn })
    }
}

#[async_trait]
impl EmbeddingStore for RedisEmbeddingStore {
    async fn append(&self, record: &EmbeddingRecord) -> Result<(), EmbeddingError> {
        let value = serde_json::to_string(record).map_err(|e| EmbeddingError::Serialization(e.to_string()))?;
        let mut conn = self.conn.clone();
        let _: i64 = redis::cmd("RPUSH")
            .arg(embedding_key(&record.doc_id))
            .arg(value)
            .query_async(&mut conn)
            .await
            .map_err(|e| EmbeddingError::Storage(format!("RPUSH failed: {e}")))?;
        Ok(())
    }

    async fn list(&self, doc_id: &str) -> Result<Vec<EmbeddingRecord>, EmbeddingError> {
        let mut conn = self.conn.clone();
        let values: Vec<String> = redis::cmd("LRANGE")
            .arg(embedding_key(doc_id))
            .arg(0)
            .arg(-1)
            .query_async(&mut conn)
            .await
            .map_err(|e| EmbeddingError::Storage(format!("LRANGE failed: {e}")))?;

        values
            .iter()
            .map(|v| serde_json::from_str(v).map_err(|e| EmbeddingError::Serialization(e.to_string())))
            .collect()
    }

    async fn clear(&self, doc_id: &str) -> Result<(), EmbeddingError> {
        let mut conn = self.conn.clone();
        let _: i64 = redis::cmd("DEL")
            .arg(embedding_key(doc_id))
            .query_async(&mut conn)
            .await
            .map_err(|e| EmbeddingError::Storage(format!("DEL failed: {e}")))?;
        Ok(())
    }
}
