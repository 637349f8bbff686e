use crate::error::ApiError;
use crate::server::AppState;
use axum::routing::get;
use axum::{Extension, Json};
use serde_json::Value;
use std::sync::Arc;

pub fn router() -> axum::Router {
    axum::Router::new().route("/data/summary", get(get_summary))
}

#[tracing::instrument(level = "info", skip_all)]
async fn get_summary(Extension(state): Extension<Arc<AppState>>) -> Result<Json<Value>, ApiError> {
    Ok(Json(state.agent.db().summary().await?))
}
