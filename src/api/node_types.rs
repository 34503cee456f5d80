/// Node type catalog endpoints

use crate::{
    api::{status_for, AppState},
    nodes::NodeTypeDefinition,
};
use axum::{extract::State, http::StatusCode, response::Json, routing::get, Router};
use serde_json::{json, Value};

pub fn create_node_type_routes() -> Router<AppState> {
    Router::new().route("/api/node-types", get(list_node_types).post(register_node_type))
}

/// GET /api/node-types
async fn list_node_types(State(state): State<AppState>) -> Json<Vec<NodeTypeDefinition>> {
    Json(state.system.get_node_types())
}

/// POST /api/node-types
///
/// Registering an existing name replaces its definition.
async fn register_node_type(
    State(state): State<AppState>,
    Json(definition): Json<NodeTypeDefinition>,
) -> Result<Json<Value>, StatusCode> {
    let name = definition.name.clone();
    match state.system.register_node_type(definition) {
        Ok(()) => Ok(Json(json!({
            "name": name,
            "message": format!("Node type '{}' registered", name),
        }))),
        Err(e) => {
            tracing::warn!("Rejected node type {}: {}", name, e);
            Err(status_for(&e))
        }
    }
}
