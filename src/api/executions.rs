/// Execution history endpoints

use crate::{api::AppState, workflow::Execution};
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::Json,
    routing::get,
    Router,
};

pub fn create_execution_routes() -> Router<AppState> {
    Router::new()
        .route("/api/executions", get(list_executions))
        .route("/api/executions/{id}", get(get_execution))
}

/// GET /api/executions (newest first)
async fn list_executions(State(state): State<AppState>) -> Json<Vec<Execution>> {
    Json(state.system.get_all_executions().await)
}

/// GET /api/executions/{id}
async fn get_execution(State(state): State<AppState>, Path(id): Path<String>) -> Result<Json<Execution>, StatusCode> {
    state
        .system
        .get_execution(&id)
        .await
        .map(Json)
        .ok_or(StatusCode::NOT_FOUND)
}
