//! Per-document chunk embeddings for similarity search.
//!
//! Records are appended to a list per document (`embeddings:{doc_id}`) and
//! read back in insertion order.

#[cfg(feature = "redis")]
pub mod redis_store;

use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;
use tracing::{debug, warn};

use clarity_ai::{AnalysisClient, RetryPolicy, with_retry};
use clarity_core::{Chunk, EmbeddingRecord};

#[cfg(feature = "redis")]
pub use redis_store::RedisEmbeddingStore;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum EmbeddingError {
    #[error("embedding vectors must be same length ({left} != {right})")]
    DimensionMismatch { left: usize, right: usize },
    #[error("storage error: {0}")]
    Storage(String),
    #[error("serialization error: {0}")]
    Serialization(String),
}

/// Storage key of a document's embedding list.
pub fn embedding_key(doc_id: &str) -> String {
    format!("embeddings:{doc_id}")
}

#[async_trait]
pub trait EmbeddingStore: Send + Sync {
    async fn append(&self, record: &EmbeddingRecord) -> Result<(), EmbeddingError>;

    /// All records of `doc_id`, in insertion order (empty when unknown).
    async fn list(&self, doc_id: &str) -> Result<Vec<EmbeddingRecord>, EmbeddingError>;

    async fn clear(&self, doc_id: &str) -> Result<(), EmbeddingError>;
}

#[derive(Debug, Default)]
pub struct InMemoryEmbeddingStore {
    docs: RwLock<HashMap<String, Vec<EmbeddingRecord>>>,
}

impl InMemoryEmbeddingStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl EmbeddingStore for InMemoryEmbeddingStore {
    async fn append(&self, record: &EmbeddingRecord) -> Result<(), EmbeddingError> {
        self.docs
            .write()
            .unwrap()
            .entry(record.doc_id.clone())
            .or_default()
            .push(record.clone());
        Ok(())
    }

    async fn list(&self, doc_id: &str) -> Result<Vec<EmbeddingRecord>, EmbeddingError> {
        Ok(self.docs.read().unwrap().get(doc_id).cloned().unwrap_or_default())
    }

    async fn clear(&self, doc_id: &str) -> Result<(), EmbeddingError> {
        self.docs.write().unwrap().remove(doc_id);
        Ok(())
    }
}

/// Cosine similarity of two vectors of equal length.
///
/// A zero vector has no direction; its similarity to anything is `0.0`.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> Result<f32, EmbeddingError> {
    if a.len() != b.len() {
        return Err(EmbeddingError::DimensionMismatch {
            left: a.len(),
            right: b.len(),
        });
    }
    let (mut dot, mut norm_a, mut norm_b) = (0.0f32, 0.0f32, 0.0f32);
    for (x, y) in a.iter().zip(b) {
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }
    let denom = norm_a.sqrt() * norm_b.sqrt();
    Ok(if denom == 0.0 { 0.0 } else { dot / denom })
}

/// Embed each chunk of `doc_id` and append it to `store`.
///
/// All chunks go out in one batch request. If the batch fails, each chunk is
/// embedded on its own; chunks whose embedding or storage fails are logged
/// and skipped. Returns the number of records stored.
pub async fn embed_and_store_chunks(
    client: &dyn AnalysisClient,
    store: &dyn EmbeddingStore,
    retry: &RetryPolicy,
    doc_id: &str,
    chunks: &[Chunk<'_>],
) -> usize {
    if chunks.is_empty() {
        return 0;
    }
    let texts: Vec<&str> = chunks.iter().map(|c| c.text).collect();
    let embeddings: Vec<Option<Vec<f32>>> = match with_retry(retry, || client.embed_batch(&texts)).await {
        Ok(batch) => batch.into_iter().map(Some).collect(),
        Err(e) => {
            warn!(doc_id, chunks = chunks.len(), error = %e, "batch embedding failed, embedding chunks one by one");
            let mut single = Vec::with_capacity(chunks.len());
            for chunk in chunks {
                match with_retry(retry, || client.embed(chunk.text)).await {
                    Ok(v) => single.push(Some(v)),
                    Err(e) => {
                        warn!(doc_id, chunk = chunk.index, error = %e, "embedding failed, skipping chunk");
                        single.push(None);
                    }
                }
            }
            single
        }
    };

    let mut stored = 0;
    for (chunk, embedding) in chunks.iter().zip(embeddings) {
        let Some(embedding) = embedding else { continue };
        let record = EmbeddingRecord {
            doc_id: doc_id.to_string(),
            chunk_id: EmbeddingRecord::chunk_id(doc_id, chunk.index),
            embedding,
            text: chunk.text.to_string(),
        };
        match store.append(&record).await {
            Ok(()) => stored += 1,
            Err(e) => warn!(doc_id, chunk_id = %record.chunk_id, error = %e, "failed to store embedding"),
        }
    }
    debug!(doc_id, stored, total = chunks.len(), "chunk embeddings stored");
    stored
}

/// The `top_k` records of `doc_id` most similar to `query`, best first.
///
/// Records whose dimension differs from the query are skipped.
pub async fn most_similar(
    store: &dyn EmbeddingStore,
    doc_id: &str,
    query: &[f32],
    top_k: usize,
) -> Result<Vec<(EmbeddingRecord, f32)>, EmbeddingError> {
    let mut scored: Vec<(EmbeddingRecord, f32)> = store
        .list(doc_id)
        .await?
        .into_iter()
        .filter_map(|r| cosine_similarity(query, &r.embedding).ok().map(|s| (r, s)))
        .collect();
    scored.sort_by(|a, b| b.1.total_cmp(&a.1));
    scored.truncate(top_k);
    Ok(scored)
}
