use axum::Json;
use axum::routing::get;
use serde_json::{Value, json};

pub fn router() -> axum::Router {
    axum::Router::new().route("/tools", get(list_tools))
}

async fn list_tools() -> Json<Value> {
    let tools: Vec<Value> = ia_tools::catalog().iter().map(|spec| spec.describe()).collect();
    Json(json!({
        "count": tools.len(),
        "tools": tools,
        "description": "Available functions that the AI agent can use to query the database",
    }))
}
