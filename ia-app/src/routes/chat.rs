use crate::error::ApiError;
use crate::safety::{dangerous_keyword, is_dangerous_query};
use crate::server::AppState;
use crate::shaper::ShapedResponse;
use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::routing::post;
use axum::{Extension, Json};
use serde::Deserialize;
use std::sync::Arc;

#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    message: String,
}

pub fn router() -> axum::Router {
    axum::Router::new().route("/chat", post(chat))
}

#[tracing::instrument(level = "info", skip_all)]
async fn chat(
    Extension(state): Extension<Arc<AppState>>,
    body: Result<Json<ChatRequest>, JsonRejection>,
) -> Result<Json<ShapedResponse>, ApiError> {
    let Json(req) = body.map_err(|e| {
        ApiError::bad_request(format!("invalid chat request: {}", e.body_text()))
    })?;

    if is_dangerous_query(&req.message) {
        let keyword = dangerous_keyword(&req.message).unwrap_or("SQL commands");
        tracing::warn!(keyword, message_len = req.message.len(), "dangerous query rejected");
        return Err(ApiError::new(
            StatusCode::BAD_REQUEST,
            "Dangerous query detected",
            format!(
                "Requests containing {keyword} are not allowed. Ask a read-only question about users, orders or sales."
            ),
        ));
    }

    Ok(Json(state.agent.chat(&req.message).await?))
}
