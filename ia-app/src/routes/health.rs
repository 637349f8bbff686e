use crate::server::AppState;
use axum::routing::get;
use axum::{Extension, Json};
use serde_json::{Value, json};
use std::sync::Arc;

pub fn router() -> axum::Router {
    axum::Router::new()
        .route("/", get(get_root))
        .route("/health", get(get_health))
}

async fn get_root() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

/// Reports configuration validity only; the model API is never contacted.
#[tracing::instrument(level = "debug", skip_all)]
async fn get_health(Extension(state): Extension<Arc<AppState>>) -> Json<Value> {
    let key = &state.api_key;
    Json(json!({
        "status": if key.is_valid() { "healthy" } else { "unhealthy" },
        "api_key_configured": key.configured,
        "api_key_length": key.length,
        "error": key.error,
    }))
}
