//! Calbridge - task/calendar sync service

use std::sync::Arc;

use anyhow::Context;
use calbridge_api::utils::logging::init_tracing;
use calbridge_api::{router, AppContext};
use tokio::net::TcpListener;
use tracing::{info, warn};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let dotenv = dotenvy::dotenv();
    init_tracing()?;
    match dotenv {
        Ok(path) => info!(path = %path.display(), "Loaded .env"),
        Err(e) => info!(error = %e, "No .env file loaded"),
    }

    let config = calbridge_infra::config::load().context("failed to load configuration")?;
    let bind_addr = config.server.bind_addr.clone();

    let ctx = Arc::new(
        AppContext::new_with_config(config).await.context("failed to initialize application")?,
    );
    let app = router(Arc::clone(&ctx));

    let listener = TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("failed to bind {bind_addr}"))?;
    info!(addr = %bind_addr, "Calbridge listening");

    axum::serve(listener, app).with_graceful_shutdown(shutdown_signal()).await?;

    if let Err(e) = ctx.shutdown().await {
        warn!(error = %e, "Shutdown did not complete cleanly");
    }
    info!("Calbridge stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "Failed to listen for shutdown signal");
    }
}
