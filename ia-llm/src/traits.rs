use crate::error::Result;
use crate::types::{ChatMessage, ChatResponse, ToolDefinition};
use async_trait::async_trait;

/// One request/response round-trip against a hosted model.
///
/// The model may answer in free text or request tool calls; it never streams
/// and never retries.
#[async_trait]
pub trait ChatModel: Send + Sync {
    fn model(&self) -> &str;

    async fn chat(&self, messages: &[ChatMessage], tools: &[ToolDefinition])
    -> Result<ChatResponse>;
}
