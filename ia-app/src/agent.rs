//! Single-shot function-calling agent over the analytics catalog.
//!
//! One model round-trip per message. The model either answers in text or
//! picks one catalog operation; the operation runs against a read-only
//! connection and its result is shaped for display. The model never sees the
//! result, and nothing it produces is ever executed as SQL.

use crate::safety::sanitize_input;
use crate::shaper::ShapedResponse;
use ia_llm::{ChatMessage, ChatModel, LlmError, ToolCall, ToolDefinition};
use ia_tools::{SalesDb, ToolError, ToolInvocation};
use std::fmt;
use std::sync::Arc;
use std::time::Instant;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpstreamKind {
    Connection,
    Authentication,
    RateLimit,
    Other,
}

impl UpstreamKind {
    /// Classify a model failure by HTTP status when the server answered,
    /// otherwise by its description.
    pub fn classify(err: &LlmError) -> Self {
        match err {
            LlmError::Connection(_) => return Self::Connection,
            LlmError::Http {
                status: Some(status),
                ..
            } => return Self::from_status(*status),
            _ => {}
        }
        let text = err.to_string().to_ascii_lowercase();
        let has = |needles: &[&str]| needles.iter().any(|n| text.contains(n));
        if has(&["429", "rate limit", "rate_limit", "ratelimit", "too many requests"]) {
            Self::RateLimit
        } else if has(&[
            "401",
            "403",
            "unauthorized",
            "forbidden",
            "authentication",
            "api key",
            "api_key",
        ]) {
            Self::Authentication
        } else if has(&["connect", "timed out", "timeout", "dns", "network"]) {
            Self::Connection
        } else {
            Self::Other
        }
    }

    fn from_status(status: u16) -> Self {
        match status {
            429 => Self::RateLimit,
            401 | 403 => Self::Authentication,
            408 | 502 | 503 | 504 => Self::Connection,
            _ => Self::Other,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Connection => "connection",
            Self::Authentication => "authentication",
            Self::RateLimit => "rate_limit",
            Self::Other => "other",
        }
    }

    pub fn guidance(self) -> &'static str {
        match self {
            Self::Connection => {
                "Could not reach the language model service. Check your network connection and try again."
            }
            Self::Authentication => {
                "The language model service rejected the API key. Check that CEREBRAS_API_KEY is set correctly."
            }
            Self::RateLimit => {
                "The language model service is rate limiting requests. Wait a moment and try again."
            }
            Self::Other => "Please try again or contact support if the issue persists.",
        }
    }
}

impl fmt::Display for UpstreamKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error)]
pub enum AgentError {
    #[error("{0}")]
    InputRejected(String),

    #[error("{0}")]
    Configuration(String),

    #[error("Error processing request: {detail}")]
    Upstream { kind: UpstreamKind, detail: String },

    #[error("Invalid table name {table:?}. Allowed tables: users, orders, sales")]
    InvalidTable { tool_used: String, table: String },

    #[error("Tool '{name}' not found")]
    UnknownOperation {
        name: String,
        available: Vec<&'static str>,
    },

    #[error("Invalid arguments for tool '{tool_used}': {detail}")]
    InvalidArguments { tool_used: String, detail: String },

    #[error("Error executing tool: {detail}")]
    Execution { tool_used: String, detail: String },
}

impl AgentError {
    pub fn empty_message() -> Self {
        Self::InputRejected("empty or invalid message".to_string())
    }

    fn from_tool(tool_used: &str, err: ToolError) -> Self {
        let tool_used = tool_used.to_string();
        match err {
            ToolError::UnknownOperation { name, available } => {
                Self::UnknownOperation { name, available }
            }
            ToolError::InvalidTable { table } => Self::InvalidTable { tool_used, table },
            ToolError::InvalidArguments(detail) => Self::InvalidArguments { tool_used, detail },
            ToolError::ExecutionFailed(detail) => Self::Execution { tool_used, detail },
        }
    }
}

pub struct AnalyticsAgent {
    model: Option<Arc<dyn ChatModel>>,
    db: SalesDb,
    system_prompt: String,
    tools: Vec<ToolDefinition>,
}

impl AnalyticsAgent {
    /// `model` is `None` when no usable credential is configured; every chat
    /// then fails with a configuration error instead of calling out.
    pub fn new(model: Option<Arc<dyn ChatModel>>, db: SalesDb, system_prompt: &str) -> Self {
        Self {
            model,
            db,
            system_prompt: system_prompt.to_string(),
            tools: ia_tools::tool_definitions(),
        }
    }

    pub fn is_configured(&self) -> bool {
        self.model.is_some()
    }

    pub fn db(&self) -> &SalesDb {
        &self.db
    }

    #[tracing::instrument(name = "agent.chat", level = "info", skip_all, fields(message_len = message.len()))]
    pub async fn chat(&self, message: &str) -> Result<ShapedResponse, AgentError> {
        let sanitized = sanitize_input(message);
        if sanitized.is_empty() {
            return Err(AgentError::empty_message());
        }
        let Some(model) = self.model.as_ref() else {
            return Err(AgentError::Configuration(
                "Language model is not configured. Set CEREBRAS_API_KEY (at least 20 characters) and restart the server.".to_string(),
            ));
        };

        tracing::info!(
            model = %model.model(),
            sanitized_len = sanitized.len(),
            tools_registered = self.tools.len(),
            "agent run started"
        );

        let messages = [
            ChatMessage::system(self.system_prompt.as_str()),
            ChatMessage::user(sanitized),
        ];
        let llm_started = Instant::now();
        let response = model.chat(&messages, &self.tools).await.map_err(|e| {
            let kind = UpstreamKind::classify(&e);
            tracing::error!(
                upstream_kind = %kind,
                error = %e,
                latency_ms = llm_started.elapsed().as_millis() as u64,
                "agent llm call failed"
            );
            AgentError::Upstream {
                kind,
                detail: e.to_string(),
            }
        })?;
        tracing::info!(
            latency_ms = llm_started.elapsed().as_millis() as u64,
            prompt_tokens = response.usage.prompt_tokens,
            completion_tokens = response.usage.completion_tokens,
            tool_calls = response.message.tool_calls.len(),
            finish_reason = %response.finish_reason,
            "agent llm call completed"
        );

        let content = response.message.content;
        let mut calls = response.message.tool_calls.into_iter();
        let Some(call) = calls.next() else {
            return Ok(ShapedResponse::answer(content));
        };
        let ignored_tool_calls = calls.len();
        if ignored_tool_calls > 0 {
            tracing::warn!(
                ignored_tool_calls,
                tool_name = %call.name,
                "model requested several tool calls; only the first is executed"
            );
        }

        let shaped = self.dispatch(&call).await?;
        Ok(shaped.with_explanation(&content))
    }

    async fn dispatch(&self, call: &ToolCall) -> Result<ShapedResponse, AgentError> {
        let invocation = ToolInvocation::from_call(&call.name, &call.arguments).map_err(|e| {
            tracing::warn!(
                tool_call_id = %call.id,
                tool_name = %call.name,
                error = %e,
                "tool call rejected"
            );
            AgentError::from_tool(&call.name, e)
        })?;
        let tool_name = invocation.name();
        let shape = invocation.kind.spec().shape;

        let started = Instant::now();
        let result = self
            .db
            .execute(invocation)
            .await
            .map_err(|e| AgentError::from_tool(tool_name, e))?;
        tracing::info!(
            tool_call_id = %call.id,
            tool_name,
            latency_ms = started.elapsed().as_millis() as u64,
            "tool call executed"
        );
        Ok(ShapedResponse::tool_result(tool_name, shape, result))
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::shaper::Visualization;
    use async_trait::async_trait;
    use ia_llm::{ChatResponse, Usage};
    use serde_json::json;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    pub(crate) const FIXTURE: &str = r#"
INSERT INTO users (id, name, email, created_at) VALUES
  (1, 'Ada Lovelace', 'ada@example.com', '2024-01-01 09:00:00'),
  (2, 'Grace Hopper', 'grace@example.com', '2024-01-02 09:00:00');
INSERT INTO orders (id, user_id, product, amount, created_at) VALUES
  (1, 1, 'Desk Lamp', 40.0, '2024-02-01 10:00:00'),
  (2, 2, 'Monitor', 200.0, '2024-02-03 12:00:00');
INSERT INTO sales (id, order_id, revenue, created_at) VALUES
  (1, 1, 50.0, '2024-02-02 10:00:00'),
  (2, 2, 250.0, '2024-02-04 09:00:00');
"#;

    pub(crate) async fn seeded_db(dir: &tempfile::TempDir) -> SalesDb {
        let db = SalesDb::new(dir.path().join("sales.db"));
        db.initialize().await.expect("initialize db");
        db.write(|conn| Ok(conn.execute_batch(FIXTURE)?))
            .await
            .expect("seed db");
        db
    }

    /// Replays queued replies and counts calls.
    pub(crate) struct ScriptedModel {
        replies: Mutex<Vec<Result<ChatResponse, LlmError>>>,
        pub(crate) calls: AtomicUsize,
    }

    impl ScriptedModel {
        pub(crate) fn new(replies: Vec<Result<ChatResponse, LlmError>>) -> Arc<Self> {
            Arc::new(Self {
                replies: Mutex::new(replies),
                calls: AtomicUsize::new(0),
            })
        }

        pub(crate) fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl ChatModel for ScriptedModel {
        fn model(&self) -> &str {
            "scripted"
        }

        async fn chat(
            &self,
            messages: &[ChatMessage],
            tools: &[ToolDefinition],
        ) -> ia_llm::Result<ChatResponse> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            assert_eq!(messages.len(), 2);
            assert!(!tools.is_empty());
            let mut replies = self.replies.lock().expect("replies lock");
            if replies.is_empty() {
                return Err(LlmError::ResponseFormat("no scripted reply left".to_string()));
            }
            replies.remove(0)
        }
    }

    pub(crate) fn text_reply(content: &str) -> Result<ChatResponse, LlmError> {
        Ok(ChatResponse {
            message: ChatMessage::assistant(content),
            usage: Usage::default(),
            finish_reason: "stop".to_string(),
        })
    }

    pub(crate) fn tool_reply(content: &str, calls: &[(&str, &str)]) -> Result<ChatResponse, LlmError> {
        let mut message = ChatMessage::assistant(content);
        message.tool_calls = calls
            .iter()
            .enumerate()
            .map(|(i, (name, args))| ToolCall {
                id: format!("call_{i}"),
                name: name.to_string(),
                arguments: args.to_string(),
            })
            .collect();
        Ok(ChatResponse {
            message,
            usage: Usage::default(),
            finish_reason: "tool_calls".to_string(),
        })
    }

    fn agent(model: Arc<ScriptedModel>, db: SalesDb) -> AnalyticsAgent {
        AnalyticsAgent::new(Some(model), db, "You are a data analytics assistant.")
    }

    #[tokio::test]
    async fn text_answer_has_no_tool() {
        let dir = tempfile::tempdir().expect("tempdir");
        let model = ScriptedModel::new(vec![text_reply("Hello! Ask me about sales.")]);
        let out = agent(model.clone(), seeded_db(&dir).await)
            .chat("hi there")
            .await
            .expect("chat");
        assert_eq!(out.answer.as_deref(), Some("Hello! Ask me about sales."));
        assert!(out.tool_used.is_none());
        assert_eq!(model.calls(), 1);
    }

    #[tokio::test]
    async fn row_count_tool_call_is_shaped_as_stat() {
        let dir = tempfile::tempdir().expect("tempdir");
        let model = ScriptedModel::new(vec![tool_reply(
            "Counting orders.",
            &[("get_row_count", r#"{"table": "orders"}"#)],
        )]);
        let out = agent(model, seeded_db(&dir).await)
            .chat("How many orders?")
            .await
            .expect("chat");
        assert_eq!(out.tool_used.as_deref(), Some("get_row_count"));
        assert_eq!(out.result, Some(json!(2)));
        assert_eq!(out.visualization, Some(Visualization::Stat { value: json!(2) }));
        assert_eq!(out.explanation.as_deref(), Some("Counting orders."));
    }

    #[tokio::test]
    async fn oversized_limit_is_clamped_and_only_first_call_runs() {
        let dir = tempfile::tempdir().expect("tempdir");
        let model = ScriptedModel::new(vec![tool_reply(
            "",
            &[
                ("get_recent_records", r#"{"table": "sales", "limit": 500}"#),
                ("get_row_count", r#"{"table": "users"}"#),
            ],
        )]);
        let out = agent(model, seeded_db(&dir).await)
            .chat("Show me recent sales")
            .await
            .expect("chat");
        assert_eq!(out.tool_used.as_deref(), Some("get_recent_records"));
        let rows = out.result.as_ref().and_then(|r| r.as_array()).expect("rows");
        assert_eq!(rows.len(), 2);
        assert!(out.explanation.is_none());
        assert!(matches!(out.visualization, Some(Visualization::Table { .. })));
    }

    #[tokio::test]
    async fn invalid_table_is_a_validation_error_with_tool_used() {
        let dir = tempfile::tempdir().expect("tempdir");
        let model = ScriptedModel::new(vec![tool_reply(
            "",
            &[("get_row_count", r#"{"table": "passwords"}"#)],
        )]);
        let err = agent(model, seeded_db(&dir).await)
            .chat("count the passwords")
            .await
            .expect_err("invalid table");
        match err {
            AgentError::InvalidTable { tool_used, table } => {
                assert_eq!(tool_used, "get_row_count");
                assert_eq!(table, "passwords");
            }
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[tokio::test]
    async fn unknown_operation_lists_the_catalog() {
        let dir = tempfile::tempdir().expect("tempdir");
        let model = ScriptedModel::new(vec![tool_reply("", &[("run_sql", r#"{"q": "x"}"#)])]);
        let err = agent(model, seeded_db(&dir).await)
            .chat("anything")
            .await
            .expect_err("unknown tool");
        let AgentError::UnknownOperation { name, available } = err else {
            panic!("expected unknown operation");
        };
        assert_eq!(name, "run_sql");
        assert_eq!(available, ia_tools::operation_names());
    }

    #[tokio::test]
    async fn missing_user_is_a_null_result_not_an_error() {
        let dir = tempfile::tempdir().expect("tempdir");
        let model = ScriptedModel::new(vec![tool_reply(
            "",
            &[("get_user_details", r#"{"user_id": 404}"#)],
        )]);
        let out = agent(model, seeded_db(&dir).await)
            .chat("who is user 404")
            .await
            .expect("chat");
        assert_eq!(out.result, Some(serde_json::Value::Null));
        assert!(out.visualization.is_none());
    }

    #[tokio::test]
    async fn empty_after_sanitizing_never_calls_the_model() {
        let dir = tempfile::tempdir().expect("tempdir");
        let model = ScriptedModel::new(vec![]);
        let err = agent(model.clone(), seeded_db(&dir).await)
            .chat(" ;; -- ")
            .await
            .expect_err("empty message");
        assert!(matches!(err, AgentError::InputRejected(_)));
        assert_eq!(model.calls(), 0);
    }

    #[tokio::test]
    async fn missing_model_is_a_configuration_error() {
        let dir = tempfile::tempdir().expect("tempdir");
        let agent = AnalyticsAgent::new(None, seeded_db(&dir).await, "prompt");
        assert!(!agent.is_configured());
        let err = agent.chat("How many users?").await.expect_err("no model");
        assert!(matches!(err, AgentError::Configuration(_)));
    }

    #[tokio::test]
    async fn upstream_failures_are_classified() {
        let dir = tempfile::tempdir().expect("tempdir");
        let model = ScriptedModel::new(vec![Err(LlmError::Connection(
            "error sending request: tcp connect error".to_string(),
        ))]);
        let err = agent(model, seeded_db(&dir).await)
            .chat("How many users?")
            .await
            .expect_err("upstream failure");
        let AgentError::Upstream { kind, .. } = err else {
            panic!("expected upstream error");
        };
        assert_eq!(kind, UpstreamKind::Connection);
    }

    #[test]
    fn classification_prefers_status_over_body_text() {
        let http = |status: Option<u16>, detail: &str| LlmError::Http {
            status,
            detail: detail.to_string(),
        };
        assert_eq!(
            UpstreamKind::classify(&http(Some(401), "chat completions status=401 Unauthorized body={}")),
            UpstreamKind::Authentication
        );
        assert_eq!(
            UpstreamKind::classify(&http(Some(429), "chat completions status=429 Too Many Requests body={}")),
            UpstreamKind::RateLimit
        );
        assert_eq!(
            UpstreamKind::classify(&http(
                Some(500),
                r#"chat completions status=500 body={"error":"context of 4290 tokens exceeds 401 limit"}"#
            )),
            UpstreamKind::Other
        );
        assert_eq!(
            UpstreamKind::classify(&http(None, "operation timed out")),
            UpstreamKind::Connection
        );
        assert_eq!(
            UpstreamKind::classify(&http(None, "upstream said 429 too many requests")),
            UpstreamKind::RateLimit
        );
        assert_eq!(
            UpstreamKind::classify(&LlmError::ResponseFormat("missing choices".to_string())),
            UpstreamKind::Other
        );
        assert!(UpstreamKind::RateLimit.guidance().contains("rate limiting"));
    }
}
