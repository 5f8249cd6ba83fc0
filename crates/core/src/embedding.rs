use serde::{Deserialize, Serialize};

/// Embedding of one document chunk, stored append-only per document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EmbeddingRecord {
    pub doc_id: String,
    pub chunk_id: String,
    pub embedding: Vec<f32>,
    pub text: String,
}

impl EmbeddingRecord {
    /// Chunk identifier convention: `{doc_id}:chunk:{index}`.
    pub fn chunk_id(doc_id: &str, index: usize) -> String {
        format!("{doc_id}:chunk:{index}")
    }
}
