use axum::{extract::State, Json};
use serde_json::{json, Value};

use crate::state::AppState;

/// GET /health
/// Liveness plus whether the auth context has finished its initial load.
pub async fn health_handler(State(state): State<AppState>) -> Json<Value> {
    Json(json!({
        "status": "ok",
        "service": "review-api",
        "version": env!("CARGO_PKG_VERSION"),
        "auth_ready": !state.auth.is_loading(),
    }))
}
