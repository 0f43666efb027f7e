//! Anthropic native provider implementation.
//!
//! Uses Anthropic's Messages API directly (not an OpenAI-compatible proxy).
//!
//! Features:
//! - `x-api-key` header authentication (not Bearer)
//! - `anthropic-version` header
//! - System prompt as top-level field
//! - Native tool use with `tool_use` / `tool_result` content blocks
//! - Streaming via SSE, decoded by [`AnthropicStreamDecoder`]

use async_trait::async_trait;
use domiclaw_core::error::ProviderError;
use domiclaw_core::message::{Message, Role, ToolCall};
use domiclaw_core::provider::*;
use futures::StreamExt;
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::sse::{AnthropicStreamDecoder, DEFAULT_MAX_LINE_BYTES, LineBuffer};

const ANTHROPIC_VERSION: &str = "2023-06-01";
const DEFAULT_BASE_URL: &str = "https://api.anthropic.com";
const DEFAULT_MAX_TOKENS: u32 = 8192;
const DEFAULT_TEMPERATURE: f32 = 0.7;

/// Anthropic native Messages API provider.
pub struct AnthropicProvider {
    name: String,
    base_url: String,
    api_key: String,
    client: reqwest::Client,
    /// Cap on a single SSE line while streaming.
    max_line_bytes: usize,
}

impl AnthropicProvider {
    /// Create a new Anthropic provider.
    pub fn new(api_key: impl Into<String>) -> Self {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(120))
            .build()
            .expect("Failed to create HTTP client");

        Self {
            name: "anthropic".into(),
            base_url: DEFAULT_BASE_URL.into(),
            api_key: api_key.into(),
            client,
            max_line_bytes: DEFAULT_MAX_LINE_BYTES,
        }
    }

    /// Create with a custom base URL (e.g., for testing or proxies).
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    /// Set the largest SSE line the streaming decoder accepts.
    pub fn with_max_line_bytes(mut self, max_line_bytes: usize) -> Self {
        self.max_line_bytes = max_line_bytes;
        self
    }

    /// Extract system messages from the message list.
    /// Anthropic puts system prompt as a top-level field, not in messages.
    fn extract_system(messages: &[Message]) -> (Option<String>, Vec<&Message>) {
        let mut system_parts: Vec<&str> = Vec::new();
        let mut non_system: Vec<&Message> = Vec::new();

        for msg in messages {
            match msg.role {
                Role::System => system_parts.push(&msg.content),
                _ => non_system.push(msg),
            }
        }

        let system = if system_parts.is_empty() {
            None
        } else {
            Some(system_parts.join("\n\n"))
        };

        (system, non_system)
    }

    /// Convert messages to Anthropic API format with content blocks.
    fn to_api_messages(messages: &[&Message]) -> Vec<AnthropicMessage> {
        let mut result = Vec::new();

        for msg in messages {
            match msg.role {
                Role::User => {
                    result.push(AnthropicMessage {
                        role: "user".into(),
                        content: AnthropicContent::Text(msg.content.clone()),
                    });
                }
                Role::Assistant => {
                    if msg.tool_calls.is_empty() {
                        result.push(AnthropicMessage {
                            role: "assistant".into(),
                            content: AnthropicContent::Text(msg.content.clone()),
                        });
                    } else {
                        let mut blocks: Vec<ContentBlock> = Vec::new();
                        if !msg.content.is_empty() {
                            blocks.push(ContentBlock::Text {
                                text: msg.content.clone(),
                            });
                        }
                        for tc in &msg.tool_calls {
                            blocks.push(ContentBlock::ToolUse {
                                id: tc.id.clone(),
                                name: tc.name.clone(),
                                input: serde_json::Value::Object(tc.arguments.clone()),
                            });
                        }
                        result.push(AnthropicMessage {
                            role: "assistant".into(),
                            content: AnthropicContent::Blocks(blocks),
                        });
                    }
                }
                Role::Tool => {
                    let block = ContentBlock::ToolResult {
                        tool_use_id: msg.tool_call_id.clone().unwrap_or_default(),
                        content: msg.content.clone(),
                    };
                    // Consecutive tool results answer one assistant turn and
                    // must travel together in a single user message.
                    match result.last_mut() {
                        Some(AnthropicMessage {
                            role,
                            content: AnthropicContent::Blocks(blocks),
                        }) if role.as_str() == "user"
                            && blocks
                                .iter()
                                .all(|b| matches!(b, ContentBlock::ToolResult { .. })) =>
                        {
                            blocks.push(block);
                        }
                        _ => result.push(AnthropicMessage {
                            role: "user".into(),
                            content: AnthropicContent::Blocks(vec![block]),
                        }),
                    }
                }
                Role::System => {} // handled separately
            }
        }

        result
    }

    /// Convert tool definitions to Anthropic format.
    fn to_api_tools(tools: &[ToolDefinition]) -> Vec<AnthropicTool> {
        tools
            .iter()
            .map(|t| AnthropicTool {
                name: t.name.clone(),
                description: t.description.clone(),
                input_schema: t.parameters.clone(),
            })
            .collect()
    }

    fn build_body(request: &ProviderRequest, stream: bool) -> serde_json::Value {
        let (system, messages) = Self::extract_system(&request.messages);

        let mut body = serde_json::json!({
            "model": request.model,
            "messages": Self::to_api_messages(&messages),
            "max_tokens": request.max_tokens.unwrap_or(DEFAULT_MAX_TOKENS),
            "temperature": request.temperature.unwrap_or(DEFAULT_TEMPERATURE),
        });

        if let Some(sys) = system {
            body["system"] = serde_json::json!(sys);
        }
        if !request.tools.is_empty() {
            body["tools"] = serde_json::json!(Self::to_api_tools(&request.tools));
        }
        if stream {
            body["stream"] = serde_json::json!(true);
        }
        body
    }

    async fn send(
        &self,
        body: &serde_json::Value,
        cancel: &CancellationToken,
    ) -> std::result::Result<reqwest::Response, ProviderError> {
        let url = format!("{}/v1/messages", self.base_url);
        let request = self
            .client
            .post(&url)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .header("Content-Type", "application/json")
            .json(body);

        let response = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(ProviderError::Cancelled),
            sent = request.send() => sent.map_err(|e| ProviderError::Network(e.to_string()))?,
        };

        let status = response.status().as_u16();
        if !response.status().is_success() {
            let error_body = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(ProviderError::Cancelled),
                text = response.text() => text.unwrap_or_default(),
            };
            warn!(status, body = %error_body, "Anthropic API error");
            return Err(decode_error(status, &error_body));
        }
        Ok(response)
    }

    /// Convert Anthropic API response to our ProviderResponse.
    fn response_to_provider_response(resp: AnthropicResponse) -> ProviderResponse {
        let mut content = String::new();
        let mut tool_calls = Vec::new();

        for block in resp.content {
            match block {
                ResponseContentBlock::Text { text } => content.push_str(&text),
                ResponseContentBlock::ToolUse { id, name, input } => {
                    let arguments = match input {
                        serde_json::Value::Object(map) => map,
                        _ => serde_json::Map::new(),
                    };
                    tool_calls.push(ToolCall::new(id, name, arguments));
                }
                ResponseContentBlock::Other => {}
            }
        }

        ProviderResponse {
            content,
            tool_calls,
            usage: Usage::new(resp.usage.input_tokens, resp.usage.output_tokens),
            stop_reason: resp.stop_reason,
        }
    }
}

/// Turn a non-2xx response into a structured error.
///
/// Anthropic error bodies look like
/// `{"type":"error","error":{"type":"rate_limit_error","message":"..."}}`.
fn decode_error(status: u16, body: &str) -> ProviderError {
    let parsed: Option<AnthropicErrorBody> = serde_json::from_str(body).ok();
    match parsed {
        Some(AnthropicErrorBody { error }) => {
            if status == 429 || error.r#type == "rate_limit_error" {
                ProviderError::RateLimited {
                    message: error.message,
                }
            } else {
                ProviderError::Api {
                    status_code: status,
                    error_type: Some(error.r#type),
                    message: error.message,
                }
            }
        }
        None if status == 429 => ProviderError::RateLimited {
            message: if body.is_empty() {
                "429 Too Many Requests".into()
            } else {
                body.to_string()
            },
        },
        None => ProviderError::Api {
            status_code: status,
            error_type: None,
            message: body.to_string(),
        },
    }
}

#[async_trait]
impl domiclaw_core::Provider for AnthropicProvider {
    fn name(&self) -> &str {
        &self.name
    }

    async fn chat(
        &self,
        request: &ProviderRequest,
        cancel: &CancellationToken,
    ) -> std::result::Result<ProviderResponse, ProviderError> {
        let body = Self::build_body(request, false);
        debug!(provider = "anthropic", model = %request.model, "Sending completion request");

        let response = self.send(&body, cancel).await?;
        let api_resp: AnthropicResponse = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(ProviderError::Cancelled),
            parsed = response.json() => parsed.map_err(|e| {
                ProviderError::Parse(format!("Failed to parse Anthropic response: {e}"))
            })?,
        };

        Ok(Self::response_to_provider_response(api_resp))
    }

    async fn chat_stream(
        &self,
        request: &ProviderRequest,
        cancel: &CancellationToken,
        on_event: EventSink<'_>,
    ) -> std::result::Result<ProviderResponse, ProviderError> {
        let body = Self::build_body(request, true);
        debug!(provider = "anthropic", model = %request.model, "Sending streaming request");

        let response = self.send(&body, cancel).await?;
        let mut byte_stream = response.bytes_stream();
        let mut lines = LineBuffer::new(self.max_line_bytes);
        let mut decoder = AnthropicStreamDecoder::new();

        loop {
            let next = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(ProviderError::Cancelled),
                next = byte_stream.next() => next,
            };
            let Some(chunk) = next else { break };
            let bytes = chunk.map_err(|e| ProviderError::Network(e.to_string()))?;
            for line in lines.push(&bytes)? {
                decoder.feed_line(&line, &mut *on_event)?;
            }
        }
        if let Some(line) = lines.finish() {
            decoder.feed_line(&line, &mut *on_event)?;
        }

        Ok(decoder.finish())
    }
}

// --- Anthropic API types ---

#[derive(Debug, Serialize, Deserialize)]
struct AnthropicMessage {
    role: String,
    content: AnthropicContent,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(untagged)]
enum AnthropicContent {
    Text(String),
    Blocks(Vec<ContentBlock>),
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(tag = "type")]
enum ContentBlock {
    #[serde(rename = "text")]
    Text { text: String },
    #[serde(rename = "tool_use")]
    ToolUse {
        id: String,
        name: String,
        input: serde_json::Value,
    },
    #[serde(rename = "tool_result")]
    ToolResult {
        tool_use_id: String,
        content: String,
    },
}

#[derive(Debug, Serialize, Deserialize)]
struct AnthropicTool {
    name: String,
    description: String,
    input_schema: serde_json::Value,
}

#[derive(Debug, Deserialize)]
struct AnthropicResponse {
    content: Vec<ResponseContentBlock>,
    usage: AnthropicUsage,
    #[serde(default)]
    stop_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type")]
enum ResponseContentBlock {
    #[serde(rename = "text")]
    Text { text: String },
    #[serde(rename = "tool_use")]
    ToolUse {
        id: String,
        name: String,
        input: serde_json::Value,
    },
    /// thinking, redacted_thinking, server tool blocks, ...
    #[serde(other)]
    Other,
}

#[derive(Debug, Deserialize)]
struct AnthropicUsage {
    input_tokens: u32,
    output_tokens: u32,
}

#[derive(Debug, Deserialize)]
struct AnthropicErrorBody {
    error: AnthropicErrorDetail,
}

#[derive(Debug, Deserialize)]
struct AnthropicErrorDetail {
    r#type: String,
    message: String,
}
