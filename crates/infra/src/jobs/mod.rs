//! Background job system: queue backends and the worker runtime.
//!
//! ## Components
//!
//! - `JobQueue`: submit/status contract plus worker-facing transitions
//! - `InMemoryJobQueue`: in-process fallback (serial execution)
//! - `RedisJobQueue`: durable, multi-worker backend (feature `redis`)
//! - `QueueBackend`: the backend selected once at startup
//! - `JobWorker`: claims jobs and runs a `JobHandler` with a `ProgressReporter`

pub mod backend;
pub mod in_memory;
pub mod queue;
#[cfg(feature = "redis")]
pub mod redis_queue;
pub mod reporter;
pub mod worker;

pub use backend::QueueBackend;
pub use in_memory::InMemoryJobQueue;
pub use queue::{JobQueue, QueueError};
#[cfg(feature = "redis")]
pub use redis_queue::RedisJobQueue;
pub use reporter::ProgressReporter;
pub use worker::{FnHandler, JobHandler, JobWorker, JobWorkerHandle, WorkerConfig, WorkerStats, handler_fn};
