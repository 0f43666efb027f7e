//! Directory listing tool.

use async_trait::async_trait;
use domiclaw_core::error::ToolError;
use domiclaw_core::tool::{Tool, ToolContext};
use serde_json::{Map, Value};

use crate::path;

/// Lists a directory, one `d|-  size name` line per entry, sorted by name.
pub struct ListDirTool;

#[async_trait]
impl Tool for ListDirTool {
    fn name(&self) -> &str {
        "list_dir"
    }

    fn description(&self) -> &str {
        "List the contents of a directory. Returns a list of files and subdirectories."
    }

    fn parameters_schema(&self) -> Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "path": {
                    "type": "string",
                    "description": "The path to the directory to list (defaults to the workspace)"
                }
            }
        })
    }

    async fn execute(&self, ctx: &ToolContext, arguments: &Map<String, Value>) -> Result<String, ToolError> {
        let raw = arguments.get("path").and_then(Value::as_str).unwrap_or(".");
        let target = path::resolve(&ctx.workspace, raw);

        let failed = |e: std::io::Error| ToolError::ExecutionFailed {
            tool_name: "list_dir".into(),
            reason: format!("failed to read directory: {e}"),
        };

        let mut dir = tokio::fs::read_dir(&target).await.map_err(failed)?;
        let mut entries = Vec::new();
        while let Some(entry) = dir.next_entry().await.map_err(failed)? {
            // Entries that vanish mid-listing are skipped.
            let Ok(meta) = entry.metadata().await else {
                continue;
            };
            entries.push((
                entry.file_name().to_string_lossy().into_owned(),
                meta.is_dir(),
                meta.len(),
            ));
        }
        entries.sort_by(|a, b| a.0.cmp(&b.0));

        let mut out = String::new();
        for (name, is_dir, size) in entries {
            let kind = if is_dir { 'd' } else { '-' };
            out.push_str(&format!("{kind} {size:>8} {name}\n"));
        }
        Ok(out)
    }
}
