use axum::{extract::State, response::IntoResponse, Json};
use serde_json::json;

use super::AppState;

/// GET /health - liveness probe
pub async fn health(State(state): State<AppState>) -> impl IntoResponse {
    let types: Vec<&str> = state.registry.type_names().collect();
    Json(json!({
        "status": "ok",
        "timestamp": chrono::Utc::now(),
        "resources": types,
    }))
}
