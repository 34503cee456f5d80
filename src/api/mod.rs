/// HTTP API Layer
///
/// Thin axum surface over `AutomationSystem`:
/// - Node type catalog and registration
/// - Workflow creation, lookup and manual execution
/// - Execution history
/// - System status and a server-sent event stream of monitoring broadcasts

use crate::{error::EngineError, system::AutomationSystem};
use axum::{http::StatusCode, Router};
use std::sync::Arc;

pub mod workflows;

pub mod executions;

pub mod node_types;

pub mod monitoring;

/// Shared handler state
#[derive(Clone)]
pub struct AppState {
    pub system: Arc<AutomationSystem>,
}

/// All `/api` routes
pub fn create_api_routes() -> Router<AppState> {
    Router::new()
        .merge(workflows::create_workflow_routes())
        .merge(executions::create_execution_routes())
        .merge(node_types::create_node_type_routes())
        .merge(monitoring::create_monitoring_routes())
}

/// HTTP status for an engine error
pub(crate) fn status_for(error: &EngineError) -> StatusCode {
    match error {
        EngineError::WorkflowNotFound(_) | EngineError::ExecutionNotFound(_) => StatusCode::NOT_FOUND,
        EngineError::InvalidWorkflow(_) | EngineError::InvalidNodeType(_) => StatusCode::BAD_REQUEST,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}
