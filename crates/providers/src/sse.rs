//! Server-Sent-Events framing and the Anthropic stream decoder.
//!
//! Transport and decoding are kept apart: [`LineBuffer`] turns arbitrary
//! byte chunks into complete lines, and [`AnthropicStreamDecoder`] folds
//! those lines into a [`ProviderResponse`] while emitting [`StreamEvent`]s.
//! Both are synchronous so they can be driven from tests with plain strings.

use std::collections::BTreeMap;

use domiclaw_core::error::ProviderError;
use domiclaw_core::message::ToolCall;
use domiclaw_core::provider::{ProviderResponse, StreamEvent, Usage};
use tracing::{debug, trace};

/// Default cap for a single SSE line (1 MiB).
pub const DEFAULT_MAX_LINE_BYTES: usize = 1024 * 1024;

/// Accumulates bytes and yields complete `\n`-terminated lines.
///
/// Works on raw bytes so a multi-byte character split across two network
/// chunks is decoded correctly. A line longer than `max_line_bytes` is an
/// error rather than silently truncated.
#[derive(Debug)]
pub struct LineBuffer {
    buf: Vec<u8>,
    max_line_bytes: usize,
}

impl LineBuffer {
    pub fn new(max_line_bytes: usize) -> Self {
        Self {
            buf: Vec::with_capacity(64 * 1024),
            max_line_bytes,
        }
    }

    /// Append a chunk and drain every complete line (without `\r\n`).
    pub fn push(&mut self, chunk: &[u8]) -> Result<Vec<String>, ProviderError> {
        self.buf.extend_from_slice(chunk);

        let mut lines = Vec::new();
        let mut start = 0;
        while let Some(pos) = self.buf[start..].iter().position(|&b| b == b'\n') {
            let end = start + pos;
            if end - start > self.max_line_bytes {
                return Err(ProviderError::LineTooLong {
                    limit: self.max_line_bytes,
                });
            }
            lines.push(decode_line(&self.buf[start..end]));
            start = end + 1;
        }
        self.buf.drain(..start);

        if self.buf.len() > self.max_line_bytes {
            return Err(ProviderError::LineTooLong {
                limit: self.max_line_bytes,
            });
        }
        Ok(lines)
    }

    /// Flush a trailing line that was not newline-terminated.
    pub fn finish(&mut self) -> Option<String> {
        if self.buf.is_empty() {
            return None;
        }
        let line = decode_line(&self.buf);
        self.buf.clear();
        Some(line)
    }
}

impl Default for LineBuffer {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_LINE_BYTES)
    }
}

fn decode_line(bytes: &[u8]) -> String {
    let bytes = bytes.strip_suffix(b"\r").unwrap_or(bytes);
    String::from_utf8_lossy(bytes).into_owned()
}

/// A tool-use block that has started but not yet stopped.
#[derive(Debug, Default)]
struct ToolAccumulator {
    id: String,
    name: String,
    partial_json: String,
}

/// State machine for the Anthropic Messages SSE protocol.
///
/// Feed it one line at a time; call [`finish`](Self::finish) once the
/// transport reaches end-of-stream.
#[derive(Debug, Default)]
pub struct AnthropicStreamDecoder {
    /// Name from the most recent `event:` line
    current_event: String,
    response: ProviderResponse,
    open_tools: BTreeMap<u64, ToolAccumulator>,
    /// Closed tool calls keyed by block index
    closed_tools: BTreeMap<u64, ToolCall>,
}

impl AnthropicStreamDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Process one SSE line.
    ///
    /// An `error` event is reported through `on_event` and then returned as
    /// [`ProviderError::Stream`]; the partial response is not to be trusted.
    pub fn feed_line(
        &mut self,
        line: &str,
        on_event: &mut dyn FnMut(StreamEvent),
    ) -> Result<(), ProviderError> {
        if line.is_empty() || line.starts_with(':') {
            return Ok(());
        }

        if let Some(name) = line.strip_prefix("event:") {
            self.current_event = name.trim().to_string();
            return Ok(());
        }

        let Some(data) = line.strip_prefix("data:") else {
            return Ok(());
        };
        let data = data.trim();
        if data.is_empty() {
            return Ok(());
        }

        let payload: serde_json::Value = match serde_json::from_str(data) {
            Ok(v) => v,
            Err(e) => {
                trace!(error = %e, data = %data, "Ignoring unparseable Anthropic SSE");
                return Ok(());
            }
        };

        // Some proxies omit `event:` lines; the payload carries the same name.
        let event_name = if self.current_event.is_empty() {
            payload["type"].as_str().unwrap_or_default().to_string()
        } else {
            self.current_event.clone()
        };

        self.apply(&event_name, &payload, on_event)
    }

    fn apply(
        &mut self,
        event_name: &str,
        payload: &serde_json::Value,
        on_event: &mut dyn FnMut(StreamEvent),
    ) -> Result<(), ProviderError> {
        match event_name {
            "message_start" => {
                if let Some(input) = payload["message"]["usage"]["input_tokens"].as_u64() {
                    self.response.usage.prompt_tokens = input as u32;
                }
            }
            "content_block_start" => {
                let block = &payload["content_block"];
                if block["type"].as_str() == Some("tool_use") {
                    let index = payload["index"].as_u64().unwrap_or_default();
                    let acc = ToolAccumulator {
                        id: block["id"].as_str().unwrap_or_default().to_string(),
                        name: block["name"].as_str().unwrap_or_default().to_string(),
                        partial_json: String::new(),
                    };
                    on_event(StreamEvent::ToolStart {
                        id: acc.id.clone(),
                        name: acc.name.clone(),
                    });
                    self.open_tools.insert(index, acc);
                }
            }
            "content_block_delta" => {
                let delta = &payload["delta"];
                match delta["type"].as_str().unwrap_or_default() {
                    "text_delta" => {
                        if let Some(text) = delta["text"].as_str() {
                            self.response.content.push_str(text);
                            on_event(StreamEvent::Text {
                                text: text.to_string(),
                            });
                        }
                    }
                    "input_json_delta" => {
                        let index = payload["index"].as_u64().unwrap_or_default();
                        let fragment = delta["partial_json"].as_str().unwrap_or_default();
                        if let Some(acc) = self.open_tools.get_mut(&index) {
                            acc.partial_json.push_str(fragment);
                            on_event(StreamEvent::ToolDelta {
                                id: acc.id.clone(),
                                partial_json: fragment.to_string(),
                            });
                        }
                    }
                    _ => {}
                }
            }
            "content_block_stop" => {
                let index = payload["index"].as_u64().unwrap_or_default();
                if let Some(acc) = self.open_tools.remove(&index) {
                    on_event(StreamEvent::ToolEnd {
                        id: acc.id.clone(),
                        name: acc.name.clone(),
                    });
                    let call = ToolCall::from_raw(acc.id, acc.name, acc.partial_json);
                    self.closed_tools.insert(index, call);
                }
            }
            "message_delta" => {
                if let Some(reason) = payload["delta"]["stop_reason"].as_str() {
                    self.response.stop_reason = Some(reason.to_string());
                }
                if let Some(output) = payload["usage"]["output_tokens"].as_u64() {
                    self.response.usage =
                        Usage::new(self.response.usage.prompt_tokens, output as u32);
                }
            }
            "message_stop" => {
                on_event(StreamEvent::Done {
                    usage: self.response.usage,
                });
            }
            "error" => {
                let error_type = payload["error"]["type"]
                    .as_str()
                    .unwrap_or("error")
                    .to_string();
                let message = payload["error"]["message"]
                    .as_str()
                    .unwrap_or("unknown stream error")
                    .to_string();
                on_event(StreamEvent::Error {
                    message: message.clone(),
                });
                return Err(ProviderError::Stream {
                    error_type,
                    message,
                });
            }
            other => {
                trace!(event = other, "Ignoring unknown Anthropic SSE event");
            }
        }
        Ok(())
    }

    /// Assemble the final response. Tool calls come out in block-index order.
    pub fn finish(mut self) -> ProviderResponse {
        if !self.open_tools.is_empty() {
            debug!(
                count = self.open_tools.len(),
                "Stream ended with unterminated tool_use blocks; dropping them"
            );
        }
        self.response.tool_calls = self.closed_tools.into_values().collect();
        self.response
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn decode(wire: &str) -> (Result<ProviderResponse, ProviderError>, Vec<StreamEvent>) {
        let mut events = Vec::new();
        let mut lines = LineBuffer::default();
        let mut decoder = AnthropicStreamDecoder::new();
        let mut sink = |e: StreamEvent| events.push(e);
        let result = (|| -> Result<(), ProviderError> {
            for line in lines.push(wire.as_bytes())? {
                decoder.feed_line(&line, &mut sink)?;
            }
            if let Some(line) = lines.finish() {
                decoder.feed_line(&line, &mut sink)?;
            }
            Ok(())
        })();
        (result.map(|_| decoder.finish()), events)
    }

    fn sse(event: &str, data: serde_json::Value) -> String {
        format!("event: {event}\ndata: {data}\n\n")
    }

    #[test]
    fn line_buffer_handles_split_chunks() {
        let mut buf = LineBuffer::new(1024);
        assert!(buf.push(b"event: mess").unwrap().is_empty());
        let lines = buf.push(b"age_start\r\ndata: {}\n\npartial").unwrap();
        assert_eq!(lines, vec!["event: message_start", "data: {}", ""]);
        assert_eq!(buf.finish().as_deref(), Some("partial"));
        assert!(buf.finish().is_none());
    }

    #[test]
    fn line_buffer_keeps_utf8_split_across_chunks() {
        let mut buf = LineBuffer::new(1024);
        let text = "héllo\n".as_bytes();
        assert!(buf.push(&text[..2]).unwrap().is_empty());
        let lines = buf.push(&text[2..]).unwrap();
        assert_eq!(lines, vec!["héllo"]);
    }

    #[test]
    fn line_buffer_accepts_lines_beyond_default_scanner_size() {
        let payload = "x".repeat(200 * 1024);
        let mut buf = LineBuffer::new(DEFAULT_MAX_LINE_BYTES);
        let lines = buf.push(format!("data: {payload}\n").as_bytes()).unwrap();
        assert_eq!(lines[0].len(), payload.len() + 6);
    }

    #[test]
    fn line_buffer_rejects_oversized_line() {
        let mut buf = LineBuffer::new(16);
        let err = buf.push(b"data: 0123456789abcdef").unwrap_err();
        assert!(matches!(err, ProviderError::LineTooLong { limit: 16 }));
    }

    #[test]
    fn reconstructs_interleaved_text_and_tools() {
        let mut wire = String::new();
        wire.push_str(&sse(
            "message_start",
            serde_json::json!({"type": "message_start", "message": {"usage": {"input_tokens": 42}}}),
        ));
        wire.push_str(&sse(
            "content_block_start",
            serde_json::json!({"index": 0, "content_block": {"type": "text", "text": ""}}),
        ));
        wire.push_str(&sse(
            "content_block_delta",
            serde_json::json!({"index": 0, "delta": {"type": "text_delta", "text": "Let me "}}),
        ));
        wire.push_str(&sse(
            "content_block_delta",
            serde_json::json!({"index": 0, "delta": {"type": "text_delta", "text": "look."}}),
        ));
        wire.push_str(&sse("content_block_stop", serde_json::json!({"index": 0})));
        wire.push_str(&sse(
            "content_block_start",
            serde_json::json!({"index": 1, "content_block": {"type": "tool_use", "id": "toolu_1", "name": "read_file"}}),
        ));
        wire.push_str(&sse(
            "content_block_delta",
            serde_json::json!({"index": 1, "delta": {"type": "input_json_delta", "partial_json": "{\"pa"}}),
        ));
        wire.push_str(&sse(
            "content_block_delta",
            serde_json::json!({"index": 1, "delta": {"type": "input_json_delta", "partial_json": "th\": \"a.go\"}"}}),
        ));
        wire.push_str(&sse("content_block_stop", serde_json::json!({"index": 1})));
        wire.push_str(&sse(
            "content_block_start",
            serde_json::json!({"index": 2, "content_block": {"type": "tool_use", "id": "toolu_2", "name": "exec"}}),
        ));
        wire.push_str(&sse(
            "content_block_delta",
            serde_json::json!({"index": 2, "delta": {"type": "input_json_delta", "partial_json": "{\"command\":\"ls\"}"}}),
        ));
        wire.push_str(&sse("content_block_stop", serde_json::json!({"index": 2})));
        wire.push_str(&sse(
            "message_delta",
            serde_json::json!({"delta": {"stop_reason": "tool_use"}, "usage": {"output_tokens": 8}}),
        ));
        wire.push_str(&sse("message_stop", serde_json::json!({"type": "message_stop"})));

        let (result, events) = decode(&wire);
        let response = result.unwrap();

        assert_eq!(response.content, "Let me look.");
        assert_eq!(response.tool_calls.len(), 2);
        assert_eq!(response.tool_calls[0].id, "toolu_1");
        assert_eq!(response.tool_calls[0].arguments["path"], "a.go");
        assert_eq!(response.tool_calls[0].raw_arguments, "{\"path\": \"a.go\"}");
        assert_eq!(response.tool_calls[1].name, "exec");
        assert_eq!(response.tool_calls[1].arguments["command"], "ls");
        assert_eq!(response.usage, Usage::new(42, 8));
        assert_eq!(response.stop_reason.as_deref(), Some("tool_use"));

        let kinds: Vec<&str> = events
            .iter()
            .map(|e| match e {
                StreamEvent::Text { .. } => "text",
                StreamEvent::ToolStart { .. } => "tool_start",
                StreamEvent::ToolDelta { .. } => "tool_delta",
                StreamEvent::ToolEnd { .. } => "tool_end",
                StreamEvent::Done { .. } => "done",
                StreamEvent::Error { .. } => "error",
            })
            .collect();
        assert_eq!(
            kinds,
            vec![
                "text", "text", "tool_start", "tool_delta", "tool_delta", "tool_end",
                "tool_start", "tool_delta", "tool_end", "done"
            ]
        );
        assert!(matches!(events.last(), Some(StreamEvent::Done { usage }) if usage.total_tokens == 50));
    }

    #[test]
    fn tool_calls_sorted_by_block_index() {
        let mut wire = String::new();
        for (index, id) in [(3, "late"), (1, "early")] {
            wire.push_str(&sse(
                "content_block_start",
                serde_json::json!({"index": index, "content_block": {"type": "tool_use", "id": id, "name": "exec"}}),
            ));
        }
        wire.push_str(&sse("content_block_stop", serde_json::json!({"index": 3})));
        wire.push_str(&sse("content_block_stop", serde_json::json!({"index": 1})));

        let (result, _) = decode(&wire);
        let ids: Vec<String> = result.unwrap().tool_calls.into_iter().map(|c| c.id).collect();
        assert_eq!(ids, vec!["early", "late"]);
    }

    #[test]
    fn malformed_tool_json_degrades_to_empty_arguments() {
        let mut wire = String::new();
        wire.push_str(&sse(
            "content_block_start",
            serde_json::json!({"index": 0, "content_block": {"type": "tool_use", "id": "t", "name": "exec"}}),
        ));
        wire.push_str(&sse(
            "content_block_delta",
            serde_json::json!({"index": 0, "delta": {"type": "input_json_delta", "partial_json": "{\"command\": "}}),
        ));
        wire.push_str(&sse("content_block_stop", serde_json::json!({"index": 0})));

        let (result, _) = decode(&wire);
        let response = result.unwrap();
        assert_eq!(response.tool_calls.len(), 1);
        assert!(response.tool_calls[0].arguments.is_empty());
    }

    #[test]
    fn error_event_discards_partial_response() {
        let mut wire = String::new();
        wire.push_str(&sse(
            "content_block_delta",
            serde_json::json!({"index": 0, "delta": {"type": "text_delta", "text": "partial"}}),
        ));
        wire.push_str(&sse(
            "error",
            serde_json::json!({"type": "error", "error": {"type": "overloaded_error", "message": "Overloaded"}}),
        ));
        wire.push_str(&sse(
            "content_block_delta",
            serde_json::json!({"index": 0, "delta": {"type": "text_delta", "text": "never seen"}}),
        ));

        let (result, events) = decode(&wire);
        match result {
            Err(ProviderError::Stream { error_type, message }) => {
                assert_eq!(error_type, "overloaded_error");
                assert_eq!(message, "Overloaded");
            }
            other => panic!("expected stream error, got {other:?}"),
        }
        assert!(matches!(events.last(), Some(StreamEvent::Error { message }) if message == "Overloaded"));
        assert_eq!(events.len(), 2);
    }

    #[test]
    fn unknown_events_and_comments_are_ignored() {
        let wire = ": keep-alive\nevent: ping\ndata: {\"type\": \"ping\"}\n\nevent: future_event\ndata: {\"x\": 1}\n\ndata: not json\n";
        let (result, events) = decode(wire);
        let response = result.unwrap();
        assert!(response.content.is_empty());
        assert!(events.is_empty());
    }

    #[test]
    fn payload_type_used_when_event_line_missing() {
        let wire = "data: {\"type\":\"content_block_delta\",\"index\":0,\"delta\":{\"type\":\"text_delta\",\"text\":\"hi\"}}\n";
        let (result, _) = decode(wire);
        assert_eq!(result.unwrap().content, "hi");
    }
}
