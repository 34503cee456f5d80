/// Nodeweave: node-based workflow automation engine
///
/// Main entry point. Loads configuration from the environment and starts the
/// engine loops plus the HTTP API:
/// - Node type catalog at /api/node-types
/// - Workflow management and manual execution at /api/workflows/*
/// - Execution history at /api/executions/*
/// - Status snapshot at /api/status and live events at /api/events
/// - Health check at /healthz

use nodeweave::{config::Config, server::start_server};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Defaults to 0.0.0.0:3004, in-memory store
    let config = Config::default();

    start_server(config).await?;

    Ok(())
}
