//! Infrastructure layer: queues, workers, caches, embeddings, config.
//!
//! Every durable concern has an in-memory implementation; the Redis ones sit
//! behind the `redis` feature.

pub mod cache;
pub mod config;
pub mod embeddings;
pub mod jobs;
pub mod qa;
