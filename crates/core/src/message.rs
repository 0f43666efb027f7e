//! Message and Transcript domain types.
//!
//! These are the vendor-neutral value objects that flow through the loop:
//! the loop builds a Transcript → a Provider adapter translates it to its wire
//! format → the Response is folded back into the Transcript.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// The role of a message sender in a conversation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// System instructions
    System,
    /// The operator or a synthetic loop instruction
    User,
    /// The model
    Assistant,
    /// Tool execution result
    Tool,
}

/// A single message in a conversation.
///
/// A `Tool` message's `tool_call_id` must reference a call emitted by the
/// immediately preceding `Assistant` message. This is not checked at runtime,
/// but every adapter preserves the pairing when translating formats.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    /// Who sent this message
    pub role: Role,

    /// The text content
    pub content: String,

    /// Tool calls requested by the assistant (if any)
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tool_calls: Vec<ToolCall>,

    /// If this is a tool result, which tool call it responds to
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,

    /// Timestamp
    pub timestamp: DateTime<Utc>,
}

impl Message {
    fn new(role: Role, content: String) -> Self {
        Self {
            role,
            content,
            tool_calls: Vec::new(),
            tool_call_id: None,
            timestamp: Utc::now(),
        }
    }

    /// Create a new user message.
    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content.into())
    }

    /// Create a new assistant message.
    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, content.into())
    }

    /// Create an assistant message that requests tool calls.
    pub fn assistant_with_tools(content: impl Into<String>, tool_calls: Vec<ToolCall>) -> Self {
        Self {
            tool_calls,
            ..Self::new(Role::Assistant, content.into())
        }
    }

    /// Create a new system message.
    pub fn system(content: impl Into<String>) -> Self {
        Self::new(Role::System, content.into())
    }

    /// Create a tool result message.
    pub fn tool_result(tool_call_id: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            tool_call_id: Some(tool_call_id.into()),
            ..Self::new(Role::Tool, content.into())
        }
    }
}

/// A tool invocation requested by the model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    /// Vendor-assigned ID, unique within a turn
    pub id: String,

    /// Name of the tool to invoke. Canonical once recorded in a Transcript.
    pub name: String,

    /// Parsed arguments
    #[serde(default)]
    pub arguments: serde_json::Map<String, serde_json::Value>,

    /// The arguments exactly as they arrived on the wire
    #[serde(default)]
    pub raw_arguments: String,
}

impl ToolCall {
    /// Build a call from structured arguments; the raw form is their JSON encoding.
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        arguments: serde_json::Map<String, serde_json::Value>,
    ) -> Self {
        let raw_arguments = serde_json::Value::Object(arguments.clone()).to_string();
        Self {
            id: id.into(),
            name: name.into(),
            arguments,
            raw_arguments,
        }
    }

    /// Build a call from a raw JSON string.
    ///
    /// Parsing is best-effort: anything that is not a JSON object yields an
    /// empty argument map while the raw text is kept verbatim.
    pub fn from_raw(id: impl Into<String>, name: impl Into<String>, raw: impl Into<String>) -> Self {
        let raw_arguments = raw.into();
        Self {
            id: id.into(),
            name: name.into(),
            arguments: parse_arguments(&raw_arguments),
            raw_arguments,
        }
    }
}

/// Parse a JSON-encoded argument object, degrading to an empty map.
pub fn parse_arguments(raw: &str) -> serde_json::Map<String, serde_json::Value> {
    if raw.trim().is_empty() {
        return serde_json::Map::new();
    }
    match serde_json::from_str::<serde_json::Value>(raw) {
        Ok(serde_json::Value::Object(map)) => map,
        _ => serde_json::Map::new(),
    }
}

/// The ordered message history passed to the model on every call.
///
/// Owned by exactly one agent loop. Grows monotonically within a turn
/// sequence and is only ever reset as a whole.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Transcript {
    messages: Vec<Message>,
}

impl Transcript {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a message.
    pub fn push(&mut self, message: Message) {
        self.messages.push(message);
    }

    /// Drop every message.
    pub fn clear(&mut self) {
        self.messages.clear();
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tool_result_links_call_id() {
        let msg = Message::tool_result("call_1", "ok");
        assert_eq!(msg.role, Role::Tool);
        assert_eq!(msg.tool_call_id.as_deref(), Some("call_1"));
    }

    #[test]
    fn tool_call_from_raw_parses_object() {
        let call = ToolCall::from_raw("t1", "read_file", r#"{"path":"a.go"}"#);
        assert_eq!(call.arguments["path"], "a.go");
        assert_eq!(call.raw_arguments, r#"{"path":"a.go"}"#);
    }

    #[test]
    fn tool_call_from_raw_degrades_on_garbage() {
        let call = ToolCall::from_raw("t1", "exec", r#"{"command": "ls"#);
        assert!(call.arguments.is_empty());
        assert_eq!(call.raw_arguments, r#"{"command": "ls"#);

        let call = ToolCall::from_raw("t2", "exec", "[1,2]");
        assert!(call.arguments.is_empty());
    }

    #[test]
    fn tool_call_new_encodes_raw() {
        let mut args = serde_json::Map::new();
        args.insert("path".into(), "x".into());
        let call = ToolCall::new("t1", "read_file", args);
        assert_eq!(call.raw_arguments, r#"{"path":"x"}"#);
    }

    #[test]
    fn transcript_push_and_clear() {
        let mut t = Transcript::new();
        t.push(Message::system("sys"));
        t.push(Message::user("hello world!"));
        assert_eq!(t.len(), 2);
        assert_eq!(t.messages()[1].role, Role::User);
        t.clear();
        assert!(t.is_empty());
    }

    #[test]
    fn role_serializes_lowercase() {
        let json = serde_json::to_string(&Role::Assistant).unwrap();
        assert_eq!(json, "\"assistant\"");
    }
}
