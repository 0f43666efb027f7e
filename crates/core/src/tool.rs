//! Tool trait: the abstraction over agent capabilities.
//!
//! Tools are what give the agent the ability to act in the world:
//! execute shell commands, read/write files, search the web, etc.

use async_trait::async_trait;
use std::collections::HashMap;
use std::path::PathBuf;
use tokio_util::sync::CancellationToken;

use crate::error::ToolError;
use crate::provider::ToolDefinition;

/// Per-invocation context handed to every tool.
#[derive(Debug, Clone)]
pub struct ToolContext {
    /// Fires when the owning loop is cancelled. Long-running tools must
    /// observe it.
    pub cancel: CancellationToken,

    /// Root directory tools operate in
    pub workspace: PathBuf,
}

impl ToolContext {
    pub fn new(workspace: impl Into<PathBuf>, cancel: CancellationToken) -> Self {
        Self {
            cancel,
            workspace: workspace.into(),
        }
    }
}

/// The core Tool trait.
///
/// Each tool (exec, read_file, write_file, ...) implements this trait. Tools
/// are registered in the ToolRegistry and made available to the agent loop.
/// Failures are returned, never panicked.
#[async_trait]
pub trait Tool: Send + Sync {
    /// The unique canonical name of this tool (e.g., "exec", "read_file").
    fn name(&self) -> &str;

    /// A description of what this tool does (sent to the LLM).
    fn description(&self) -> &str;

    /// JSON Schema describing this tool's parameters.
    fn parameters_schema(&self) -> serde_json::Value;

    /// Execute the tool with the given arguments, returning result text.
    async fn execute(
        &self,
        ctx: &ToolContext,
        arguments: &serde_json::Map<String, serde_json::Value>,
    ) -> std::result::Result<String, ToolError>;

    /// Convert this tool into a ToolDefinition for sending to the LLM.
    fn to_definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: self.name().to_string(),
            description: self.description().to_string(),
            parameters: self.parameters_schema(),
        }
    }
}

/// A registry of available tools.
///
/// The agent loop uses this to:
/// 1. Get tool definitions to send to the LLM
/// 2. Resolve whatever name the model used to a canonical one
/// 3. Look up and execute tools when the LLM requests them
///
/// Registration happens once at construction; afterwards the registry is
/// read-only and safe to share between loops behind an `Arc`.
pub struct ToolRegistry {
    tools: HashMap<String, Box<dyn Tool>>,
    /// lowercase alias -> canonical name
    aliases: HashMap<String, String>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self {
            tools: HashMap::new(),
            aliases: HashMap::new(),
        }
    }

    /// Register a tool. Replaces any existing tool with the same name.
    pub fn register(&mut self, tool: Box<dyn Tool>) {
        let name = tool.name().to_string();
        self.tools.insert(name, tool);
    }

    /// Register a case-insensitive alias for a canonical tool name.
    pub fn register_alias(&mut self, alias: &str, canonical: &str) {
        self.aliases
            .insert(alias.to_lowercase(), canonical.to_string());
    }

    /// Map a model-supplied name to its canonical registry name.
    ///
    /// Exact tool names win over aliases. Unknown names come back unchanged.
    pub fn resolve_name(&self, name: &str) -> String {
        if self.tools.contains_key(name) {
            return name.to_string();
        }
        match self.aliases.get(&name.to_lowercase()) {
            Some(canonical) => canonical.clone(),
            None => name.to_string(),
        }
    }

    /// Get a tool by name or alias.
    pub fn get(&self, name: &str) -> Option<&dyn Tool> {
        self.tools.get(&self.resolve_name(name)).map(|t| t.as_ref())
    }

    /// Canonical names of all registered tools, sorted.
    pub fn list(&self) -> Vec<String> {
        let mut names: Vec<String> = self.tools.keys().cloned().collect();
        names.sort();
        names
    }

    /// Get all tool definitions (for sending to the LLM), sorted by name.
    pub fn definitions(&self) -> Vec<ToolDefinition> {
        let mut defs: Vec<ToolDefinition> = self.tools.values().map(|t| t.to_definition()).collect();
        defs.sort_by(|a, b| a.name.cmp(&b.name));
        defs
    }

    /// Resolve `name` and execute the tool.
    ///
    /// An unknown name yields [`ToolError::NotFound`] listing the available
    /// tools, so the caller can hand it back to the model as text.
    pub async fn execute(
        &self,
        ctx: &ToolContext,
        name: &str,
        arguments: &serde_json::Map<String, serde_json::Value>,
    ) -> std::result::Result<String, ToolError> {
        let tool = self.get(name).ok_or_else(|| ToolError::NotFound {
            name: name.to_string(),
            available: self.list(),
        })?;
        tool.execute(ctx, arguments).await
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// A simple test tool for unit tests.
    struct EchoTool;

    #[async_trait]
    impl Tool for EchoTool {
        fn name(&self) -> &str {
            "echo"
        }
        fn description(&self) -> &str {
            "Echoes back the input"
        }
        fn parameters_schema(&self) -> serde_json::Value {
            serde_json::json!({
                "type": "object",
                "properties": {
                    "text": { "type": "string" }
                },
                "required": ["text"]
            })
        }
        async fn execute(
            &self,
            _ctx: &ToolContext,
            arguments: &serde_json::Map<String, serde_json::Value>,
        ) -> std::result::Result<String, ToolError> {
            arguments
                .get("text")
                .and_then(|v| v.as_str())
                .map(str::to_string)
                .ok_or_else(|| ToolError::InvalidArguments("text is required".into()))
        }
    }

    struct NamedTool(&'static str);

    #[async_trait]
    impl Tool for NamedTool {
        fn name(&self) -> &str {
            self.0
        }
        fn description(&self) -> &str {
            "test tool"
        }
        fn parameters_schema(&self) -> serde_json::Value {
            serde_json::json!({"type": "object"})
        }
        async fn execute(
            &self,
            _ctx: &ToolContext,
            _arguments: &serde_json::Map<String, serde_json::Value>,
        ) -> std::result::Result<String, ToolError> {
            Ok(self.0.to_string())
        }
    }

    fn ctx() -> ToolContext {
        ToolContext::new(std::env::temp_dir(), CancellationToken::new())
    }

    fn args(json: serde_json::Value) -> serde_json::Map<String, serde_json::Value> {
        json.as_object().cloned().unwrap_or_default()
    }

    #[test]
    fn registry_register_and_lookup() {
        let mut registry = ToolRegistry::new();
        registry.register(Box::new(EchoTool));
        assert!(registry.get("echo").is_some());
        assert!(registry.get("nonexistent").is_none());
    }

    #[test]
    fn alias_resolution_is_case_insensitive() {
        let mut registry = ToolRegistry::new();
        registry.register_alias("Bash", "exec");
        registry.register(Box::new(NamedTool("exec")));

        assert_eq!(registry.resolve_name("Bash"), "exec");
        assert_eq!(registry.resolve_name("BASH"), "exec");
        assert_eq!(registry.resolve_name("bash"), "exec");
        assert_eq!(registry.resolve_name("exec"), "exec");
        assert_eq!(registry.resolve_name("unknown"), "unknown");
        assert_eq!(registry.get("Bash").map(|t| t.name()), Some("exec"));
    }

    #[test]
    fn definitions_are_sorted() {
        let mut registry = ToolRegistry::new();
        registry.register(Box::new(NamedTool("write_file")));
        registry.register(Box::new(NamedTool("exec")));
        registry.register(Box::new(NamedTool("read_file")));
        let names: Vec<String> = registry.definitions().into_iter().map(|d| d.name).collect();
        assert_eq!(names, vec!["exec", "read_file", "write_file"]);
        assert_eq!(registry.list(), names);
    }

    #[tokio::test]
    async fn registry_execute_tool() {
        let mut registry = ToolRegistry::new();
        registry.register(Box::new(EchoTool));

        let result = registry
            .execute(&ctx(), "echo", &args(serde_json::json!({"text": "hello world"})))
            .await
            .unwrap();
        assert_eq!(result, "hello world");
    }

    #[tokio::test]
    async fn registry_execute_via_alias() {
        let mut registry = ToolRegistry::new();
        registry.register(Box::new(NamedTool("exec")));
        registry.register_alias("shell", "exec");

        let result = registry.execute(&ctx(), "Shell", &args(serde_json::json!({}))).await.unwrap();
        assert_eq!(result, "exec");
    }

    #[tokio::test]
    async fn registry_execute_missing_tool() {
        let mut registry = ToolRegistry::new();
        registry.register(Box::new(EchoTool));
        let err = registry
            .execute(&ctx(), "nonexistent", &args(serde_json::json!({})))
            .await
            .unwrap_err();
        match err {
            ToolError::NotFound { name, available } => {
                assert_eq!(name, "nonexistent");
                assert_eq!(available, vec!["echo"]);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn tool_errors_are_returned() {
        let mut registry = ToolRegistry::new();
        registry.register(Box::new(EchoTool));
        let err = registry
            .execute(&ctx(), "echo", &args(serde_json::json!({})))
            .await
            .unwrap_err();
        assert!(matches!(err, ToolError::InvalidArguments(_)));
    }
}
