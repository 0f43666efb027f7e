//! File write tool: create or overwrite files inside the workspace.

use async_trait::async_trait;
use domiclaw_core::error::ToolError;
use domiclaw_core::tool::{Tool, ToolContext};
use serde_json::{Map, Value};
use tracing::debug;

use crate::{path, required_str};

pub struct WriteFileTool;

#[async_trait]
impl Tool for WriteFileTool {
    fn name(&self) -> &str {
        "write_file"
    }

    fn description(&self) -> &str {
        "Write content to a file at the given path. Creates the file if it doesn't exist, overwrites if it does."
    }

    fn parameters_schema(&self) -> Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "path": {
                    "type": "string",
                    "description": "The path to the file to write"
                },
                "content": {
                    "type": "string",
                    "description": "The content to write to the file"
                }
            },
            "required": ["path", "content"]
        })
    }

    async fn execute(&self, ctx: &ToolContext, arguments: &Map<String, Value>) -> Result<String, ToolError> {
        let raw = required_str(arguments, "path")?;
        let content = required_str(arguments, "content")?;

        let target = path::confine(&ctx.workspace, raw).map_err(|e| ToolError::PermissionDenied {
            tool_name: "write_file".into(),
            reason: e.to_string(),
        })?;

        if let Some(parent) = target.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| ToolError::ExecutionFailed {
                    tool_name: "write_file".into(),
                    reason: format!("failed to create directory: {e}"),
                })?;
        }

        tokio::fs::write(&target, content)
            .await
            .map_err(|e| ToolError::ExecutionFailed {
                tool_name: "write_file".into(),
                reason: format!("failed to write file: {e}"),
            })?;

        debug!(path = %target.display(), bytes = content.len(), "File written");
        Ok(format!("Successfully wrote {} bytes to {raw}", content.len()))
    }
}
