//! JSON error envelope for every HTTP route.
//!
//! Handlers return `Result<_, ApiError>`; each failure becomes
//! `{error, message}` plus `tool_used` or `available_tools` when known.

use crate::agent::AgentError;
use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;

const RETRY_GUIDANCE: &str = "Please try again or contact support if the issue persists.";
const VALIDATION_GUIDANCE: &str =
    "The assistant picked an operation it cannot run. Try rephrasing your question.";

#[derive(Debug, Clone, Serialize)]
pub struct ApiError {
    #[serde(skip)]
    status: StatusCode,
    error: String,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_used: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    available_tools: Option<Vec<String>>,
}

impl ApiError {
    pub fn new(status: StatusCode, error: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            status,
            error: error.into(),
            message: message.into(),
            tool_used: None,
            available_tools: None,
        }
    }

    pub fn bad_request(error: impl Into<String>) -> Self {
        Self::new(
            StatusCode::BAD_REQUEST,
            error,
            "Check the request body and try again.",
        )
    }

    pub fn not_found(error: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, error, "No matching record exists.")
    }

    pub fn internal(error: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, error, RETRY_GUIDANCE)
    }

    pub fn with_tool_used(mut self, tool_used: impl Into<String>) -> Self {
        self.tool_used = Some(tool_used.into());
        self
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }
}

impl From<AgentError> for ApiError {
    fn from(err: AgentError) -> Self {
        let error = err.to_string();
        match err {
            AgentError::InputRejected(_) => Self::new(
                StatusCode::BAD_REQUEST,
                error,
                "Ask a question about users, orders or sales without SQL commands.",
            ),
            AgentError::Configuration(_) => Self::internal(error),
            AgentError::Upstream { kind, .. } => {
                Self::new(StatusCode::INTERNAL_SERVER_ERROR, error, kind.guidance())
            }
            AgentError::InvalidTable { tool_used, .. }
            | AgentError::InvalidArguments { tool_used, .. } => {
                Self::new(StatusCode::UNPROCESSABLE_ENTITY, error, VALIDATION_GUIDANCE)
                    .with_tool_used(tool_used)
            }
            AgentError::UnknownOperation { available, .. } => {
                let mut out = Self::new(StatusCode::UNPROCESSABLE_ENTITY, error, VALIDATION_GUIDANCE);
                out.available_tools = Some(available.into_iter().map(str::to_string).collect());
                out
            }
            AgentError::Execution { tool_used, .. } => Self::internal(error).with_tool_used(tool_used),
        }
    }
}

impl From<ia_tools::ToolError> for ApiError {
    fn from(err: ia_tools::ToolError) -> Self {
        tracing::error!(error = %err, "database operation failed");
        Self::internal(err.to_string())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        if self.status.is_server_error() {
            tracing::error!(status = self.status.as_u16(), error = %self.error, "request failed");
        } else {
            tracing::warn!(status = self.status.as_u16(), error = %self.error, "request rejected");
        }
        (self.status, Json(self)).into_response()
    }
}

impl std::fmt::Display for ApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.error)
    }
}

impl std::error::Error for ApiError {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::UpstreamKind;
    use serde_json::json;

    fn body(err: &ApiError) -> serde_json::Value {
        serde_json::to_value(err).expect("serialize")
    }

    #[test]
    fn invalid_table_maps_to_422_with_tool_used() {
        let err = ApiError::from(AgentError::InvalidTable {
            tool_used: "get_row_count".to_string(),
            table: "passwords".to_string(),
        });
        assert_eq!(err.status(), StatusCode::UNPROCESSABLE_ENTITY);
        let body = body(&err);
        assert_eq!(body["tool_used"], "get_row_count");
        assert!(
            body["error"]
                .as_str()
                .is_some_and(|e| e.contains("Allowed tables: users, orders, sales"))
        );
        assert!(body.get("available_tools").is_none());
    }

    #[test]
    fn unknown_operation_lists_available_tools() {
        let err = ApiError::from(AgentError::UnknownOperation {
            name: "run_sql".to_string(),
            available: vec!["get_row_count", "get_sales_stats"],
        });
        assert_eq!(
            body(&err),
            json!({
                "error": "Tool 'run_sql' not found",
                "message": VALIDATION_GUIDANCE,
                "available_tools": ["get_row_count", "get_sales_stats"],
            })
        );
    }

    #[test]
    fn upstream_kinds_carry_distinct_guidance() {
        let auth = ApiError::from(AgentError::Upstream {
            kind: UpstreamKind::Authentication,
            detail: "status=401".to_string(),
        });
        let conn = ApiError::from(AgentError::Upstream {
            kind: UpstreamKind::Connection,
            detail: "connect refused".to_string(),
        });
        assert_eq!(auth.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_ne!(body(&auth)["message"], body(&conn)["message"]);
        assert!(
            body(&auth)["message"]
                .as_str()
                .is_some_and(|m| m.contains("CEREBRAS_API_KEY"))
        );
    }

    #[test]
    fn rejected_input_is_400_and_execution_is_500() {
        assert_eq!(
            ApiError::from(AgentError::empty_message()).status(),
            StatusCode::BAD_REQUEST
        );
        let exec = ApiError::from(AgentError::Execution {
            tool_used: "get_sales_stats".to_string(),
            detail: "database is locked".to_string(),
        });
        assert_eq!(exec.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body(&exec)["error"], "Error executing tool: database is locked");
        assert_eq!(body(&exec)["tool_used"], "get_sales_stats");
    }
}
