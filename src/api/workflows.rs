/// Workflow REST endpoints
///
/// Creation, lookup and manual execution. Execution is asynchronous: the
/// response carries the execution id, the run happens on the next queue tick.

use crate::{
    api::{status_for, AppState},
    workflow::{NewWorkflow, Workflow},
};
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::Json,
    routing::{get, post},
    Router,
};
use serde::Serialize;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecuteResponse {
    pub execution_id: String,
}

pub fn create_workflow_routes() -> Router<AppState> {
    Router::new()
        .route("/api/workflows", post(create_workflow).get(list_workflows))
        .route("/api/workflows/{id}", get(get_workflow))
        .route("/api/workflows/{id}/execute", post(execute_workflow))
}

/// POST /api/workflows
async fn create_workflow(
    State(state): State<AppState>,
    Json(payload): Json<NewWorkflow>,
) -> Result<(StatusCode, Json<Workflow>), StatusCode> {
    match state.system.create_workflow(payload).await {
        Ok(workflow) => Ok((StatusCode::CREATED, Json(workflow))),
        Err(e) => {
            tracing::warn!("Failed to create workflow: {}", e);
            Err(status_for(&e))
        }
    }
}

/// GET /api/workflows
async fn list_workflows(State(state): State<AppState>) -> Json<Vec<Workflow>> {
    Json(state.system.get_all_workflows())
}

/// GET /api/workflows/{id}
async fn get_workflow(State(state): State<AppState>, Path(id): Path<String>) -> Result<Json<Workflow>, StatusCode> {
    state.system.get_workflow(&id).map(Json).ok_or(StatusCode::NOT_FOUND)
}

/// POST /api/workflows/{id}/execute
async fn execute_workflow(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<(StatusCode, Json<ExecuteResponse>), StatusCode> {
    match state.system.execute_workflow_manually(&id).await {
        Ok(execution_id) => Ok((StatusCode::ACCEPTED, Json(ExecuteResponse { execution_id }))),
        Err(e) => {
            tracing::warn!("Manual execution of {} rejected: {}", id, e);
            Err(status_for(&e))
        }
    }
}
