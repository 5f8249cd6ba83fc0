//! Standalone Q&A worker draining the durable queue.

use clarity_api::app::{AppServices, services};
use clarity_infra::config::AppConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    clarity_observability::init();

    let config = AppConfig::from_env()?;
    let state = AppServices::from_config(&config).await?;
    if !state.queue.is_durable() {
        tracing::warn!("no durable queue configured; this worker only sees jobs submitted to itself");
    }

    let worker = services::start_qa_worker(&config, &state.queue, "clarity-worker").await?;

    tokio::signal::ctrl_c().await?;
    tracing::info!("shutdown requested, waiting for in-flight job");
    worker.shutdown().await;
    Ok(())
}
