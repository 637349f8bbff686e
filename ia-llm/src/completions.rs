//! OpenAI-compatible `chat/completions` wire format.

use crate::error::{LlmError, Result};
use crate::types::{ChatMessage, ChatResponse, Role, ToolCall, ToolDefinition, Usage};
use serde::{Deserialize, Serialize};

/// Sends one non-streaming completion request and decodes the first choice.
#[tracing::instrument(level = "debug", skip_all)]
pub(crate) async fn complete(
    http: &reqwest::Client,
    url: &str,
    api_key: &str,
    model: &str,
    messages: &[ChatMessage],
    tools: &[ToolDefinition],
) -> Result<ChatResponse> {
    let response = http
        .post(url)
        .bearer_auth(api_key)
        .json(&CompletionRequest::new(model, messages, tools))
        .send()
        .await?;

    let status = response.status();
    let body = response.text().await?;
    if !status.is_success() {
        tracing::warn!(status = status.as_u16(), body_len = body.len(), "chat completion rejected");
        return Err(LlmError::Http {
            status: Some(status.as_u16()),
            detail: format!("chat completions status={status} body={body}"),
        });
    }

    let parsed: CompletionResponse = serde_json::from_str(&body)?;
    parsed.try_into()
}

/// Wire body of `POST {base}/chat/completions`.
#[derive(Debug, Serialize)]
struct CompletionRequest<'a> {
    model: &'a str,
    messages: Vec<WireMessage<'a>>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    tools: Vec<WireTool<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_choice: Option<&'static str>,
}

impl<'a> CompletionRequest<'a> {
    fn new(model: &'a str, messages: &'a [ChatMessage], tools: &'a [ToolDefinition]) -> Self {
        Self {
            model,
            messages: messages
                .iter()
                .map(|m| WireMessage {
                    role: m.role.as_str(),
                    content: &m.content,
                })
                .collect(),
            tools: tools
                .iter()
                .map(|t| WireTool {
                    kind: "function",
                    function: WireFunction {
                        name: &t.name,
                        description: &t.description,
                        parameters: &t.parameters,
                    },
                })
                .collect(),
            tool_choice: (!tools.is_empty()).then_some("auto"),
        }
    }
}

#[derive(Debug, Serialize)]
struct WireMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Serialize)]
struct WireTool<'a> {
    #[serde(rename = "type")]
    kind: &'static str,
    function: WireFunction<'a>,
}

#[derive(Debug, Serialize)]
struct WireFunction<'a> {
    name: &'a str,
    description: &'a str,
    parameters: &'a serde_json::Value,
}

#[derive(Debug, Deserialize)]
struct CompletionResponse {
    choices: Vec<Choice>,
    #[serde(default)]
    usage: Option<WireUsage>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChoiceMessage,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    tool_calls: Vec<ChoiceToolCall>,
}

#[derive(Debug, Deserialize)]
struct ChoiceToolCall {
    #[serde(default)]
    id: String,
    #[serde(default)]
    function: ChoiceFunction,
}

#[derive(Debug, Deserialize, Default)]
struct ChoiceFunction {
    #[serde(default)]
    name: String,
    #[serde(default)]
    arguments: String,
}

#[derive(Debug, Deserialize)]
struct WireUsage {
    #[serde(default)]
    prompt_tokens: u32,
    #[serde(default)]
    completion_tokens: u32,
}

impl TryFrom<CompletionResponse> for ChatResponse {
    type Error = LlmError;

    fn try_from(v: CompletionResponse) -> Result<Self> {
        let choice = v.choices.into_iter().next().ok_or_else(|| {
            LlmError::ResponseFormat("chat completion response missing choices".to_string())
        })?;

        let usage = v.usage.map_or_else(Usage::default, |u| Usage {
            prompt_tokens: u.prompt_tokens,
            completion_tokens: u.completion_tokens,
        });

        let tool_calls = choice
            .message
            .tool_calls
            .into_iter()
            .map(|tc| ToolCall {
                id: tc.id,
                name: tc.function.name,
                arguments: tc.function.arguments,
            })
            .collect();

        Ok(ChatResponse {
            message: ChatMessage {
                role: Role::Assistant,
                content: choice.message.content.unwrap_or_default(),
                tool_calls,
            },
            usage,
            finish_reason: choice
                .finish_reason
                .unwrap_or_else(|| "unknown".to_string()),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn request_sets_auto_tool_choice_only_with_tools() {
        let messages = vec![ChatMessage::system("be brief"), ChatMessage::user("hi")];
        let without = serde_json::to_value(CompletionRequest::new("m", &messages, &[]))
            .expect("serialize request");
        assert!(without.get("tool_choice").is_none());
        assert!(without.get("tools").is_none());

        let tools = vec![ToolDefinition {
            name: "get_row_count".to_string(),
            description: "count rows".to_string(),
            parameters: json!({"type": "object", "properties": {}}),
        }];
        let with = serde_json::to_value(CompletionRequest::new("m", &messages, &tools))
            .expect("serialize request");
        assert_eq!(with["tool_choice"], "auto");
        assert_eq!(with["tools"][0]["type"], "function");
        assert_eq!(with["tools"][0]["function"]["name"], "get_row_count");
        assert_eq!(with["messages"][0]["role"], "system");
        assert_eq!(with["messages"][1]["content"], "hi");
    }

    #[test]
    fn response_with_tool_calls_is_converted() {
        let raw = json!({
            "choices": [{
                "message": {
                    "content": null,
                    "tool_calls": [
                        {"id": "call_1", "type": "function", "function": {"name": "get_row_count", "arguments": "{\"table\":\"orders\"}"}},
                        {"id": "call_2", "type": "function", "function": {"name": "get_sales_stats", "arguments": "{}"}}
                    ]
                },
                "finish_reason": "tool_calls"
            }],
            "usage": {"prompt_tokens": 120, "completion_tokens": 14}
        });
        let parsed: CompletionResponse = serde_json::from_value(raw).expect("parse response");
        let resp = ChatResponse::try_from(parsed).expect("convert response");
        assert_eq!(resp.message.content, "");
        assert_eq!(resp.message.tool_calls.len(), 2);
        assert_eq!(resp.message.tool_calls[0].name, "get_row_count");
        assert_eq!(resp.message.tool_calls[0].arguments, "{\"table\":\"orders\"}");
        assert_eq!(resp.usage.prompt_tokens, 120);
        assert_eq!(resp.finish_reason, "tool_calls");
    }

    #[test]
    fn response_without_choices_is_rejected() {
        let parsed: CompletionResponse =
            serde_json::from_value(json!({"choices": []})).expect("parse response");
        let err = ChatResponse::try_from(parsed).expect_err("empty choices must fail");
        assert!(matches!(err, LlmError::ResponseFormat(_)));
    }
}
