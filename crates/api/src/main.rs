use std::sync::Arc;

use anyhow::Context;

use clarity_api::app::{self, AppServices, services};
use clarity_infra::config::AppConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    clarity_observability::init();

    let config = AppConfig::from_env()?;
    let state = AppServices::from_config(&config).await?;

    let worker = if state.needs_embedded_worker(&config) {
        Some(services::start_qa_worker(&config, &state.queue, "api-embedded-worker").await?)
    } else {
        tracing::info!("embedded worker disabled; expecting an external clarity-worker");
        None
    };

    let app = app::build_app(Arc::new(state));

    let listener = tokio::net::TcpListener::bind(config.bind_addr)
        .await
        .with_context(|| format!("failed to bind {}", config.bind_addr))?;

    tracing::info!("listening on {}", listener.local_addr()?);

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
        })
        .await?;

    if let Some(worker) = worker {
        worker.shutdown().await;
    }
    Ok(())
}
