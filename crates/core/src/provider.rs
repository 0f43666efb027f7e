//! Provider trait: the abstraction over LLM backends.
//!
//! A Provider knows how to send a transcript to a model and get a response
//! back, either in one piece or as an ordered series of [`StreamEvent`]s
//! followed by the same assembled [`ProviderResponse`].
//!
//! Implementations: Anthropic Messages API (with SSE streaming) and
//! OpenAI-compatible chat completions (OpenRouter and friends).

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

use crate::error::ProviderError;
use crate::message::{Message, ToolCall};

/// Configuration for a provider request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderRequest {
    /// The model to use (e.g., "claude-sonnet-4-20250514")
    pub model: String,

    /// The conversation messages, system prompt included
    pub messages: Vec<Message>,

    /// Available tools the model can call
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tools: Vec<ToolDefinition>,

    /// Maximum tokens to generate. Adapters fall back to their own default.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,

    /// Sampling temperature. Adapters fall back to their own default.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
}

impl ProviderRequest {
    pub fn new(model: impl Into<String>, messages: Vec<Message>) -> Self {
        Self {
            model: model.into(),
            messages,
            tools: Vec::new(),
            max_tokens: None,
            temperature: None,
        }
    }

    pub fn with_tools(mut self, tools: Vec<ToolDefinition>) -> Self {
        self.tools = tools;
        self
    }
}

/// A tool definition sent to the LLM so it knows what tools it can call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolDefinition {
    /// The tool name
    pub name: String,

    /// Description of what the tool does
    pub description: String,

    /// JSON Schema describing the tool's parameters
    pub parameters: serde_json::Value,
}

/// The unit returned by both the synchronous and the streaming call path.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProviderResponse {
    /// Concatenated assistant text
    pub content: String,

    /// Requested tool calls, in the order the model emitted them
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tool_calls: Vec<ToolCall>,

    /// Token usage statistics
    #[serde(default)]
    pub usage: Usage,

    /// Why generation stopped ("end_turn", "tool_use", "stop", ...)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stop_reason: Option<String>,
}

impl ProviderResponse {
    pub fn has_tool_calls(&self) -> bool {
        !self.tool_calls.is_empty()
    }
}

/// Token usage information.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Usage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
}

impl Usage {
    pub fn new(prompt_tokens: u32, completion_tokens: u32) -> Self {
        Self {
            prompt_tokens,
            completion_tokens,
            total_tokens: prompt_tokens + completion_tokens,
        }
    }
}

impl std::ops::AddAssign for Usage {
    fn add_assign(&mut self, rhs: Self) {
        self.prompt_tokens += rhs.prompt_tokens;
        self.completion_tokens += rhs.completion_tokens;
        self.total_tokens += rhs.total_tokens;
    }
}

/// One incremental event of a streaming exchange, in wire arrival order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StreamEvent {
    /// A fragment of assistant text
    Text { text: String },

    /// A tool-use block opened
    ToolStart { id: String, name: String },

    /// A raw fragment of tool arguments. Only the concatenation of all
    /// fragments for one call is guaranteed to be valid JSON.
    ToolDelta { id: String, partial_json: String },

    /// A tool-use block closed
    ToolEnd { id: String, name: String },

    /// The message finished
    Done { usage: Usage },

    /// The vendor reported an error mid-stream
    Error { message: String },
}

/// Callback that receives stream events synchronously as they are decoded.
///
/// It runs on the task reading the response body, so it must not block.
pub type EventSink<'a> = &'a mut (dyn FnMut(StreamEvent) + Send);

/// The events a streaming decode of `response` would have produced.
///
/// Used by adapters without a native streaming path so that `chat_stream`
/// yields the same event shape and the same final response as `chat`.
pub fn synthesize_events(response: &ProviderResponse) -> Vec<StreamEvent> {
    let mut events = Vec::new();
    if !response.content.is_empty() {
        events.push(StreamEvent::Text {
            text: response.content.clone(),
        });
    }
    for call in &response.tool_calls {
        events.push(StreamEvent::ToolStart {
            id: call.id.clone(),
            name: call.name.clone(),
        });
        events.push(StreamEvent::ToolDelta {
            id: call.id.clone(),
            partial_json: call.raw_arguments.clone(),
        });
        events.push(StreamEvent::ToolEnd {
            id: call.id.clone(),
            name: call.name.clone(),
        });
    }
    events.push(StreamEvent::Done {
        usage: response.usage,
    });
    events
}

/// The core Provider trait.
///
/// Every backend implements this trait. The agent loop calls `chat_stream()`
/// without knowing which vendor is behind it. Both calls must abort the
/// in-flight exchange and return [`ProviderError::Cancelled`] promptly once
/// `cancel` fires.
#[async_trait]
pub trait Provider: Send + Sync {
    /// A human-readable name for this provider (e.g., "anthropic", "openrouter").
    fn name(&self) -> &str;

    /// Send a request and get a complete response.
    async fn chat(
        &self,
        request: &ProviderRequest,
        cancel: &CancellationToken,
    ) -> std::result::Result<ProviderResponse, ProviderError>;

    /// Send a request, invoking `on_event` for each decoded event before
    /// returning the assembled response.
    ///
    /// Default implementation calls `chat()` and replays the result as events.
    async fn chat_stream(
        &self,
        request: &ProviderRequest,
        cancel: &CancellationToken,
        on_event: EventSink<'_>,
    ) -> std::result::Result<ProviderResponse, ProviderError> {
        let response = self.chat(request, cancel).await?;
        for event in synthesize_events(&response) {
            on_event(event);
        }
        Ok(response)
    }
}
