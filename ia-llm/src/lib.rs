//! Hosted language-model client for the insight agent.
//!
//! Speaks the OpenAI-compatible chat-completions protocol (Cerebras, OpenAI,
//! local gateways) with function calling. Callers depend on the [`ChatModel`]
//! trait so the agent can be driven by a scripted model in tests.

mod client;
mod completions;
mod error;
mod traits;
mod types;

pub use client::{LlmClient, validate_tool_name};
pub use error::{LlmError, Result};
pub use traits::ChatModel;
pub use types::{ChatMessage, ChatResponse, Role, ToolCall, ToolDefinition, Usage};
