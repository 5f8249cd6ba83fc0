//! Splitting combined upload content into named documents, and question
//! classification.

use std::sync::LazyLock;

use regex::Regex;

/// Separator between documents in combined content.
pub const DOCUMENT_SEPARATOR: &str = "\n\n---\n\n";

static DOCUMENT_MARKER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^Document: (.+?)\n\n((?s:.*))$").expect("document marker pattern is valid")
});

static SUMMARY_WORD: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"summar(y|ize|ising|ization|ing)\b").expect("summary pattern is valid")
});

static COLLECTION_REF: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(all|these|every|multiple) (documents|files)").expect("collection pattern is valid")
});

static TOPIC_WORD: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"overview|explain|content|state|cover|contain").expect("topic pattern is valid")
});

const COLLECTION_PHRASES: [&str; 5] = ["all documents", "all files", "these documents", "these files", "everything"];

/// One named document of an upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceDocument {
    pub name: String,
    pub text: String,
}

impl SourceDocument {
    pub fn new(name: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            text: text.into(),
        }
    }
}

/// Parse combined content of the form
/// `Document: a\n\n<text>\n\n---\n\nDocument: b\n\n<text>`.
///
/// Parts without a `Document:` header are skipped. Content with no header at
/// all but some text is treated as a single document named `Document 1`.
pub fn parse_document_content(content: &str) -> Vec<SourceDocument> {
    let documents: Vec<SourceDocument> = content
        .split(DOCUMENT_SEPARATOR)
        .filter_map(|part| {
            let caps = DOCUMENT_MARKER.captures(part)?;
            Some(SourceDocument::new(caps[1].trim(), caps[2].trim()))
        })
        .collect();

    if documents.is_empty() && !content.trim().is_empty() {
        return vec![SourceDocument::new("Document 1", content.trim())];
    }
    documents
}

/// Whether `question` asks for an overview of the documents rather than a
/// specific fact.
pub fn is_broad_summary_question(question: &str) -> bool {
    let q = question.to_lowercase();

    if COLLECTION_PHRASES.iter().any(|p| q.contains(p)) {
        return true;
    }
    if TOPIC_WORD.is_match(&q) && COLLECTION_REF.is_match(&q) {
        return true;
    }
    SUMMARY_WORD.is_match(&q)
}
