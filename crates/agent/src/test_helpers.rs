//! Shared test helpers for loop tests.

use std::collections::VecDeque;
use std::sync::Mutex;

use domiclaw_core::error::ProviderError;
use domiclaw_core::message::ToolCall;
use domiclaw_core::provider::{Provider, ProviderRequest, ProviderResponse, Usage};
use domiclaw_core::CancellationToken;
use tokio::time::Instant;

/// A mock provider that returns a sequence of scripted results.
///
/// Each call to `chat` pops the next result and records the request and the
/// (tokio) time it arrived. Panics if more calls are made than results provided.
pub struct SequentialMockProvider {
    results: Mutex<VecDeque<Result<ProviderResponse, ProviderError>>>,
    requests: Mutex<Vec<ProviderRequest>>,
    call_times: Mutex<Vec<Instant>>,
}

impl SequentialMockProvider {
    pub fn new(results: Vec<Result<ProviderResponse, ProviderError>>) -> Self {
        Self {
            results: Mutex::new(results.into()),
            requests: Mutex::new(Vec::new()),
            call_times: Mutex::new(Vec::new()),
        }
    }

    pub fn responses(responses: Vec<ProviderResponse>) -> Self {
        Self::new(responses.into_iter().map(Ok).collect())
    }

    pub fn call_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    pub fn requests(&self) -> Vec<ProviderRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn call_times(&self) -> Vec<Instant> {
        self.call_times.lock().unwrap().clone()
    }
}

#[async_trait::async_trait]
impl Provider for SequentialMockProvider {
    fn name(&self) -> &str {
        "sequential_mock"
    }

    async fn chat(
        &self,
        request: &ProviderRequest,
        _cancel: &CancellationToken,
    ) -> Result<ProviderResponse, ProviderError> {
        self.requests.lock().unwrap().push(request.clone());
        self.call_times.lock().unwrap().push(Instant::now());
        let next = self.results.lock().unwrap().pop_front();
        match next {
            Some(result) => result,
            None => panic!(
                "SequentialMockProvider: no more responses (call #{})",
                self.call_count()
            ),
        }
    }
}

/// Create a simple text response (no tool calls).
pub fn make_text_response(text: &str) -> ProviderResponse {
    ProviderResponse {
        content: text.into(),
        tool_calls: vec![],
        usage: Usage::new(10, 5),
        stop_reason: Some("end_turn".into()),
    }
}

/// Create a response with tool calls and optional accompanying text.
pub fn make_tool_call_response(tool_calls: Vec<ToolCall>, text: &str) -> ProviderResponse {
    ProviderResponse {
        content: text.into(),
        tool_calls,
        usage: Usage::new(10, 5),
        stop_reason: Some("tool_use".into()),
    }
}

/// Helper to create a tool call.
pub fn make_tool_call(id: &str, name: &str, args: serde_json::Value) -> ToolCall {
    let arguments = match args {
        serde_json::Value::Object(map) => map,
        _ => serde_json::Map::new(),
    };
    ToolCall::new(id, name, arguments)
}

pub fn rate_limited() -> ProviderError {
    ProviderError::RateLimited {
        message: "rate_limit_error: Number of request tokens has exceeded your per-minute rate limit".into(),
    }
}
