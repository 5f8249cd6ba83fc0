use serde::{Deserialize, Serialize};

/// Final summary of one document, as produced by the summarization pipeline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentSummary {
    pub name: String,
    pub summary: String,
    /// Number of chunks the document was split into (0 for empty documents).
    pub chunk_count: usize,
    /// Inline notes about chunks that failed or a combination that fell back.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<String>,
}

impl DocumentSummary {
    pub fn new(name: impl Into<String>, summary: impl Into<String>, chunk_count: usize) -> Self {
        Self {
            name: name.into(),
            summary: summary.into(),
            chunk_count,
            errors: Vec::new(),
        }
    }

    pub fn with_errors(mut self, errors: Vec<String>) -> Self {
        self.errors = errors;
        self
    }
}
