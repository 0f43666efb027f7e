//! File read tool: read file contents.

use async_trait::async_trait;
use domiclaw_core::error::ToolError;
use domiclaw_core::tool::{Tool, ToolContext};
use serde_json::{Map, Value};

use crate::{path, required_str};

/// Reads a file. Relative paths are taken relative to the workspace.
pub struct ReadFileTool;

#[async_trait]
impl Tool for ReadFileTool {
    fn name(&self) -> &str {
        "read_file"
    }

    fn description(&self) -> &str {
        "Read the contents of a file at the given path. Returns the file content as text."
    }

    fn parameters_schema(&self) -> Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "path": {
                    "type": "string",
                    "description": "The path to the file to read"
                }
            },
            "required": ["path"]
        })
    }

    async fn execute(&self, ctx: &ToolContext, arguments: &Map<String, Value>) -> Result<String, ToolError> {
        let raw = required_str(arguments, "path")?;
        let target = path::resolve(&ctx.workspace, raw);

        tokio::fs::read_to_string(&target)
            .await
            .map_err(|e| ToolError::ExecutionFailed {
                tool_name: "read_file".into(),
                reason: format!("failed to read file: {e}"),
            })
    }
}
