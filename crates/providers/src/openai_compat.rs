//! OpenAI-compatible provider implementation.
//!
//! Works with OpenRouter, OpenAI, vLLM, Together AI and any endpoint that
//! exposes `/chat/completions`. Only the non-streaming path is used; the
//! trait's default `chat_stream` replays the final response as events.

use async_trait::async_trait;
use domiclaw_core::error::ProviderError;
use domiclaw_core::message::{Message, Role, ToolCall};
use domiclaw_core::provider::*;
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

pub const OPENROUTER_BASE_URL: &str = "https://openrouter.ai/api/v1";
const DEFAULT_MAX_TOKENS: u32 = 8192;
const DEFAULT_TEMPERATURE: f32 = 0.7;

/// An OpenAI-compatible LLM provider.
pub struct OpenAiCompatProvider {
    name: String,
    base_url: String,
    api_key: String,
    client: reqwest::Client,
    /// Extra headers sent with every request
    headers: Vec<(String, String)>,
}

impl OpenAiCompatProvider {
    /// Create a new OpenAI-compatible provider.
    pub fn new(
        name: impl Into<String>,
        base_url: impl Into<String>,
        api_key: impl Into<String>,
    ) -> Self {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(120))
            .build()
            .expect("Failed to create HTTP client");

        Self {
            name: name.into(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            client,
            headers: Vec::new(),
        }
    }

    /// Create an OpenRouter provider (convenience constructor).
    ///
    /// OpenRouter uses `HTTP-Referer` and `X-Title` for app attribution.
    pub fn openrouter(api_key: impl Into<String>) -> Self {
        Self::new("openrouter", OPENROUTER_BASE_URL, api_key)
            .with_header("HTTP-Referer", "https://github.com/domiclaw/domiclaw")
            .with_header("X-Title", "DomiClaw")
    }

    /// Point at a different endpoint (e.g., a self-hosted proxy).
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    /// Add a header sent with every request.
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// Convert our Message types to OpenAI API format.
    fn to_api_messages(messages: &[Message]) -> Vec<ApiMessage> {
        messages
            .iter()
            .map(|m| {
                let tool_calls = if m.tool_calls.is_empty() {
                    None
                } else {
                    Some(
                        m.tool_calls
                            .iter()
                            .map(|tc| ApiToolCall {
                                id: tc.id.clone(),
                                r#type: "function".into(),
                                function: ApiFunction {
                                    name: tc.name.clone(),
                                    arguments: encode_arguments(tc),
                                },
                            })
                            .collect(),
                    )
                };
                // Assistant turns that only call tools carry a null content.
                let content = if tool_calls.is_some() && m.content.is_empty() {
                    None
                } else {
                    Some(m.content.clone())
                };
                ApiMessage {
                    role: match m.role {
                        Role::User => "user".into(),
                        Role::Assistant => "assistant".into(),
                        Role::System => "system".into(),
                        Role::Tool => "tool".into(),
                    },
                    content,
                    tool_calls,
                    tool_call_id: m.tool_call_id.clone(),
                }
            })
            .collect()
    }

    /// Convert tool definitions to OpenAI API format.
    fn to_api_tools(tools: &[ToolDefinition]) -> Vec<ApiToolDefinition> {
        tools
            .iter()
            .map(|t| ApiToolDefinition {
                r#type: "function".into(),
                function: ApiToolFunction {
                    name: t.name.clone(),
                    description: t.description.clone(),
                    parameters: t.parameters.clone(),
                },
            })
            .collect()
    }

    fn build_body(request: &ProviderRequest) -> serde_json::Value {
        let mut body = serde_json::json!({
            "model": request.model,
            "messages": Self::to_api_messages(&request.messages),
            "max_tokens": request.max_tokens.unwrap_or(DEFAULT_MAX_TOKENS),
            "temperature": request.temperature.unwrap_or(DEFAULT_TEMPERATURE),
            "stream": false,
        });

        if !request.tools.is_empty() {
            body["tools"] = serde_json::json!(Self::to_api_tools(&request.tools));
        }
        body
    }

    fn api_response_to_provider_response(
        api_response: ApiResponse,
    ) -> std::result::Result<ProviderResponse, ProviderError> {
        if let Some(error) = api_response.error {
            return Err(error.into_provider_error(200));
        }

        let choice = api_response
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| ProviderError::Parse("No choices in response".into()))?;

        let tool_calls: Vec<ToolCall> = choice
            .message
            .tool_calls
            .unwrap_or_default()
            .into_iter()
            .map(|tc| ToolCall::from_raw(tc.id, tc.function.name, tc.function.arguments))
            .collect();

        let usage = api_response
            .usage
            .map(|u| Usage::new(u.prompt_tokens, u.completion_tokens))
            .unwrap_or_default();

        Ok(ProviderResponse {
            content: choice.message.content.unwrap_or_default(),
            tool_calls,
            usage,
            stop_reason: choice.finish_reason,
        })
    }
}

fn encode_arguments(call: &ToolCall) -> String {
    if call.raw_arguments.is_empty() {
        serde_json::Value::Object(call.arguments.clone()).to_string()
    } else {
        call.raw_arguments.clone()
    }
}

/// Turn a non-2xx response into a structured error.
fn decode_error(status: u16, body: &str) -> ProviderError {
    match serde_json::from_str::<ApiErrorBody>(body) {
        Ok(ApiErrorBody { error }) => error.into_provider_error(status),
        Err(_) if status == 429 => ProviderError::RateLimited {
            message: if body.is_empty() {
                "429 Too Many Requests".into()
            } else {
                body.to_string()
            },
        },
        Err(_) => ProviderError::Api {
            status_code: status,
            error_type: None,
            message: body.to_string(),
        },
    }
}

#[async_trait]
impl domiclaw_core::Provider for OpenAiCompatProvider {
    fn name(&self) -> &str {
        &self.name
    }

    async fn chat(
        &self,
        request: &ProviderRequest,
        cancel: &CancellationToken,
    ) -> std::result::Result<ProviderResponse, ProviderError> {
        let url = format!("{}/chat/completions", self.base_url);
        let body = Self::build_body(request);

        debug!(provider = %self.name, model = %request.model, "Sending completion request");

        let mut builder = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json");
        for (name, value) in &self.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }

        let response = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(ProviderError::Cancelled),
            sent = builder.json(&body).send() => sent.map_err(|e| ProviderError::Network(e.to_string()))?,
        };

        let status = response.status().as_u16();
        let text = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(ProviderError::Cancelled),
            text = response.text() => text.map_err(|e| ProviderError::Network(e.to_string()))?,
        };

        if !(200..300).contains(&status) {
            warn!(provider = %self.name, status, body = %text, "Provider returned error");
            return Err(decode_error(status, &text));
        }

        let api_response: ApiResponse = serde_json::from_str(&text)
            .map_err(|e| ProviderError::Parse(format!("Failed to parse response: {e}")))?;

        Self::api_response_to_provider_response(api_response)
    }
}

// --- OpenAI API types ---

#[derive(Debug, Serialize, Deserialize)]
struct ApiMessage {
    role: String,
    #[serde(default)]
    content: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    tool_calls: Option<Vec<ApiToolCall>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    tool_call_id: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
struct ApiToolCall {
    id: String,
    #[serde(default = "function_type")]
    r#type: String,
    function: ApiFunction,
}

fn function_type() -> String {
    "function".into()
}

#[derive(Debug, Serialize, Deserialize)]
struct ApiFunction {
    name: String,
    #[serde(default)]
    arguments: String,
}

#[derive(Debug, Serialize, Deserialize)]
struct ApiToolDefinition {
    r#type: String,
    function: ApiToolFunction,
}

#[derive(Debug, Serialize, Deserialize)]
struct ApiToolFunction {
    name: String,
    description: String,
    parameters: serde_json::Value,
}

#[derive(Debug, Deserialize)]
struct ApiResponse {
    #[serde(default)]
    choices: Vec<ApiChoice>,
    #[serde(default)]
    usage: Option<ApiUsage>,
    /// OpenRouter can report upstream failures inside a 200 body.
    #[serde(default)]
    error: Option<ApiErrorDetail>,
}

#[derive(Debug, Deserialize)]
struct ApiChoice {
    message: ApiMessage,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiUsage {
    prompt_tokens: u32,
    completion_tokens: u32,
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    error: ApiErrorDetail,
}

#[derive(Debug, Deserialize)]
struct ApiErrorDetail {
    #[serde(default)]
    message: String,
    #[serde(default)]
    r#type: Option<String>,
    /// A string like "context_length_exceeded" or a numeric HTTP code
    #[serde(default)]
    code: Option<serde_json::Value>,
}

impl ApiErrorDetail {
    fn into_provider_error(self, status: u16) -> ProviderError {
        let code = self.code.as_ref().and_then(|c| match c {
            serde_json::Value::String(s) => Some(s.clone()),
            _ => None,
        });
        let numeric = self.code.as_ref().and_then(|c| c.as_u64());
        let status_code = match numeric {
            Some(n) if (400..600).contains(&n) => n as u16,
            _ => status,
        };

        let error_type = code.or(self.r#type);
        if status_code == 429 || error_type.as_deref() == Some("rate_limit_exceeded") {
            return ProviderError::RateLimited {
                message: self.message,
            };
        }
        ProviderError::Api {
            status_code,
            error_type,
            message: self.message,
        }
    }
}
