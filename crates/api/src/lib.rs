//! HTTP API: job submission and status polling over the analysis queue.

pub mod app;
