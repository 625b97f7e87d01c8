//! Anthropic-native adapter.
//!
//! Implements the Anthropic Messages API including tool use. Tool results
//! travel as `tool_result` blocks inside user messages, which is how the API
//! models them. A request that carries no tool definitions cannot contain
//! tool blocks at all, so those requests get their tool parts flattened into
//! plain text turns.

use crate::traits::{ChatRequest, ChatResponse, LlmProvider};
use crate::util::from_reqwest;
use serde_json::Value;
use tc_domain::config::LlmConfig;
use tc_domain::error::{Error, Result};
use tc_domain::tool::{
    ContentPart, ContentUnit, Message, MessageContent, Role, ToolCall, ToolDefinition, Usage,
};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Constants
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

const ANTHROPIC_VERSION: &str = "2023-06-01";

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Adapter struct
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// An LLM provider adapter for the Anthropic Messages API.
pub struct AnthropicProvider {
    id: String,
    base_url: String,
    api_key: String,
    default_model: String,
    client: reqwest::Client,
}

impl AnthropicProvider {
    /// Create a provider from the LLM config and an already-resolved key.
    pub fn new(cfg: &LlmConfig, api_key: impl Into<String>) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_millis(cfg.timeout_ms))
            .build()
            .map_err(from_reqwest)?;

        Ok(Self {
            id: cfg.id.clone(),
            base_url: cfg.base_url.trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            default_model: cfg.default_model.clone(),
            client,
        })
    }

    // ── Internal helpers ───────────────────────────────────────────

    fn authed_post(&self, url: &str) -> reqwest::RequestBuilder {
        self.client
            .post(url)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .header("Content-Type", "application/json")
    }

    fn build_messages_body(&self, req: &ChatRequest) -> Value {
        let model = req
            .model
            .clone()
            .unwrap_or_else(|| self.default_model.clone());

        let flatten = req.tools.is_empty();
        let api_messages: Vec<Value> = req
            .messages
            .iter()
            .filter_map(|msg| {
                if flatten {
                    flattened_msg_to_anthropic(msg)
                } else {
                    match msg.role {
                        Role::User => user_msg_to_anthropic(msg),
                        Role::Assistant => assistant_msg_to_anthropic(msg),
                        Role::Tool => tool_result_to_anthropic(msg),
                    }
                }
            })
            .collect();

        let mut body = serde_json::json!({
            "model": model,
            "messages": api_messages,
        });

        if !req.tools.is_empty() {
            let tools: Vec<Value> = req.tools.iter().map(tool_to_anthropic).collect();
            body["tools"] = Value::Array(tools);
        }

        if let Some(temp) = req.temperature {
            body["temperature"] = serde_json::json!(temp);
        }
        let max_tokens = req.max_tokens.unwrap_or(4096);
        body["max_tokens"] = serde_json::json!(max_tokens);

        body
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Message serialization helpers
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

fn text_block(text: &str) -> Option<Value> {
    // The API rejects empty text blocks.
    if text.is_empty() {
        return None;
    }
    Some(serde_json::json!({ "type": "text", "text": text }))
}

fn user_msg_to_anthropic(msg: &Message) -> Option<Value> {
    match &msg.content {
        MessageContent::Text(t) => Some(serde_json::json!({
            "role": "user",
            "content": t,
        })),
        MessageContent::Parts(parts) => {
            let content: Vec<Value> = parts
                .iter()
                .filter_map(|p| match p {
                    ContentPart::Text { text } => text_block(text),
                    _ => None,
                })
                .collect();
            if content.is_empty() {
                return None;
            }
            Some(serde_json::json!({
                "role": "user",
                "content": content,
            }))
        }
    }
}

fn assistant_msg_to_anthropic(msg: &Message) -> Option<Value> {
    let content: Vec<Value> = match &msg.content {
        MessageContent::Text(t) => text_block(t).into_iter().collect(),
        MessageContent::Parts(parts) => parts
            .iter()
            .filter_map(|p| match p {
                ContentPart::Text { text } => text_block(text),
                ContentPart::ToolUse { id, name, input } => Some(serde_json::json!({
                    "type": "tool_use",
                    "id": id,
                    "name": name,
                    "input": input,
                })),
                ContentPart::ToolResult { .. } => None,
            })
            .collect(),
    };
    if content.is_empty() {
        return None;
    }
    Some(serde_json::json!({
        "role": "assistant",
        "content": content,
    }))
}

fn tool_result_to_anthropic(msg: &Message) -> Option<Value> {
    // Anthropic: tool results are user messages with tool_result content blocks.
    let content: Vec<Value> = match &msg.content {
        MessageContent::Parts(parts) => parts
            .iter()
            .filter_map(|p| match p {
                ContentPart::ToolResult {
                    tool_use_id,
                    content,
                    is_error,
                } => Some(serde_json::json!({
                    "type": "tool_result",
                    "tool_use_id": tool_use_id,
                    "content": content,
                    "is_error": is_error,
                })),
                _ => None,
            })
            .collect(),
        MessageContent::Text(t) => text_block(t).into_iter().collect(),
    };
    if content.is_empty() {
        return None;
    }
    Some(serde_json::json!({
        "role": "user",
        "content": content,
    }))
}

/// Render a message without any tool blocks.
///
/// Tool calls become a short assistant note and tool results are handed to
/// the model as user text, so the history stays readable to a request that
/// declares no tools.
fn flattened_msg_to_anthropic(msg: &Message) -> Option<Value> {
    let (role, text) = match (&msg.role, &msg.content) {
        (Role::User, content) => ("user", content.extract_all_text()),
        (Role::Assistant, MessageContent::Text(t)) => ("assistant", t.clone()),
        (Role::Assistant, MessageContent::Parts(parts)) => {
            let pieces: Vec<String> = parts
                .iter()
                .filter_map(|p| match p {
                    ContentPart::Text { text } if !text.is_empty() => Some(text.clone()),
                    ContentPart::ToolUse { name, input, .. } => {
                        Some(format!("[called tool {name} with {input}]"))
                    }
                    _ => None,
                })
                .collect();
            ("assistant", pieces.join("\n\n"))
        }
        (Role::Tool, MessageContent::Text(t)) => ("user", t.clone()),
        (Role::Tool, MessageContent::Parts(parts)) => {
            let pieces: Vec<&str> = parts
                .iter()
                .filter_map(|p| match p {
                    ContentPart::ToolResult { content, .. } => Some(content.as_str()),
                    ContentPart::Text { text } => Some(text.as_str()),
                    ContentPart::ToolUse { .. } => None,
                })
                .collect();
            ("user", pieces.join("\n\n"))
        }
    };
    if text.is_empty() {
        return None;
    }
    Some(serde_json::json!({ "role": role, "content": text }))
}

fn tool_to_anthropic(tool: &ToolDefinition) -> Value {
    serde_json::json!({
        "name": tool.name,
        "description": tool.description,
        "input_schema": tool.parameters,
    })
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Response deserialization
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

fn parse_anthropic_response(body: &Value) -> Result<ChatResponse> {
    let content_arr = body
        .get("content")
        .and_then(|v| v.as_array())
        .ok_or_else(|| Error::Other("anthropic response has no content array".into()))?;

    let mut content: Vec<ContentUnit> = Vec::with_capacity(content_arr.len());

    for block in content_arr {
        let block_type = block.get("type").and_then(|v| v.as_str()).unwrap_or("");
        match block_type {
            "text" => {
                if let Some(t) = block.get("text").and_then(|v| v.as_str()) {
                    content.push(ContentUnit::Text { text: t.to_string() });
                }
            }
            "tool_use" => {
                let call_id = block
                    .get("id")
                    .and_then(|v| v.as_str())
                    .unwrap_or("")
                    .to_string();
                let tool_name = block
                    .get("name")
                    .and_then(|v| v.as_str())
                    .unwrap_or("")
                    .to_string();
                let arguments = block
                    .get("input")
                    .cloned()
                    .unwrap_or(Value::Object(Default::default()));
                content.push(ContentUnit::ToolUse(ToolCall {
                    call_id,
                    tool_name,
                    arguments,
                }));
            }
            other => {
                tracing::debug!(block_type = other, "ignoring anthropic content block");
            }
        }
    }

    let model = body
        .get("model")
        .and_then(|v| v.as_str())
        .unwrap_or("unknown")
        .to_string();

    let finish_reason = body
        .get("stop_reason")
        .and_then(|v| v.as_str())
        .map(|s| match s {
            "end_turn" => "stop".to_string(),
            "tool_use" => "tool_calls".to_string(),
            other => other.to_string(),
        });

    let usage = body.get("usage").and_then(parse_anthropic_usage);

    Ok(ChatResponse {
        content,
        usage,
        model,
        finish_reason,
    })
}

fn parse_anthropic_usage(v: &Value) -> Option<Usage> {
    let input = v.get("input_tokens")?.as_u64()? as u32;
    let output = v.get("output_tokens")?.as_u64()? as u32;
    Some(Usage {
        prompt_tokens: input,
        completion_tokens: output,
        total_tokens: input + output,
    })
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Trait implementation
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[async_trait::async_trait]
impl LlmProvider for AnthropicProvider {
    async fn chat(&self, req: ChatRequest) -> Result<ChatResponse> {
        let url = format!("{}/v1/messages", self.base_url);
        let body = self.build_messages_body(&req);

        tracing::debug!(
            provider = %self.id,
            url = %url,
            tools = req.tools.len(),
            messages = req.messages.len(),
            "anthropic chat request"
        );

        let resp = self
            .authed_post(&url)
            .json(&body)
            .send()
            .await
            .map_err(from_reqwest)?;

        let status = resp.status();
        let resp_text = resp.text().await.map_err(from_reqwest)?;

        if status == reqwest::StatusCode::UNAUTHORIZED {
            return Err(Error::Auth(format!("HTTP 401 - {resp_text}")));
        }
        if !status.is_success() {
            return Err(Error::Provider {
                provider: self.id.clone(),
                message: format!("HTTP {} - {}", status.as_u16(), resp_text),
            });
        }

        let resp_json: Value = serde_json::from_str(&resp_text)?;
        parse_anthropic_response(&resp_json)
    }

    fn provider_id(&self) -> &str {
        &self.id
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Tests
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
