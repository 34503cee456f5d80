/// Server setup and initialization
///
/// Builds the automation system from configuration, starts its background
/// loops and serves the HTTP API until Ctrl-C.

use crate::{
    api::{create_api_routes, AppState},
    config::Config,
    system::AutomationSystem,
};
use anyhow::Result;
use axum::{routing::get, Router};
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;

/// Create the Axum application around an existing system
pub fn create_app(system: Arc<AutomationSystem>) -> Router {
    Router::new()
        .route("/healthz", get(health_check))
        .merge(create_api_routes().with_state(AppState { system }))
}

/// Start the engine and HTTP server with the given configuration
pub async fn start_server(config: Config) -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_target(false)
        .with_thread_ids(true)
        .with_level(true)
        .init();

    tracing::info!("Starting Nodeweave server...");

    tracing::info!("🏗️ Initializing automation system");
    let system = Arc::new(AutomationSystem::from_config(&config).await?);
    system.start().await;

    let app = create_app(Arc::clone(&system));

    let bind_addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = TcpListener::bind(&bind_addr).await?;
    tracing::info!("Server listening on http://{}", bind_addr);

    axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    system.shutdown().await;
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("❌ Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("🛑 Shutdown signal received");
}

/// Health check endpoint handler
async fn health_check() -> &'static str {
    "ok"
}
