//! `clarity-core`: shared building blocks for the analysis job runtime.
//!
//! This crate contains **pure** types and algorithms (no I/O): job records and
//! their lifecycle, progress, document chunking, content fingerprints, and the
//! contracts (cache, progress sink) that infra backends implement.

pub mod cache;
pub mod chunk;
pub mod embedding;
pub mod error;
pub mod fingerprint;
pub mod id;
pub mod job;
pub mod progress;
pub mod summary;

pub use cache::{NoopCache, SummaryCache, summary_cache_key};
pub use chunk::{Chunk, DEFAULT_MAX_CHUNK_CHARS, chunk_text, reassemble};
pub use embedding::EmbeddingRecord;
pub use error::{CoreError, CoreResult};
pub use fingerprint::fingerprint;
pub use id::JobId;
pub use job::{JobProgress, JobRecord, JobState, JobStatus};
pub use progress::{NoopProgress, ProgressSink};
pub use summary::DocumentSummary;
