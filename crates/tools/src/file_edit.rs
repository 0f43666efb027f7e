//! Edit tool: exact string replacement in a workspace file.

use async_trait::async_trait;
use domiclaw_core::error::ToolError;
use domiclaw_core::tool::{Tool, ToolContext};
use serde_json::{Map, Value};

use crate::{path, required_str};

pub struct EditFileTool;

fn failed(reason: impl Into<String>) -> ToolError {
    ToolError::ExecutionFailed {
        tool_name: "edit_file".into(),
        reason: reason.into(),
    }
}

/// Replace `old` with `new` in `original`.
///
/// Fails when `old` is absent, or when it occurs more than once and
/// `replace_all` is not set. Returns the new text and the number of
/// replacements.
fn apply_edit(original: &str, old: &str, new: &str, replace_all: bool) -> Result<(String, usize), ToolError> {
    if old.is_empty() {
        return Err(ToolError::InvalidArguments("old_string must not be empty".into()));
    }
    let count = original.matches(old).count();
    if count == 0 {
        return Err(failed("old_string not found in file"));
    }
    if count > 1 && !replace_all {
        return Err(failed(format!(
            "old_string found {count} times. Use replace_all=true to replace all, or provide more context to make it unique"
        )));
    }
    let updated = if replace_all {
        original.replace(old, new)
    } else {
        original.replacen(old, new, 1)
    };
    Ok((updated, count))
}

#[async_trait]
impl Tool for EditFileTool {
    fn name(&self) -> &str {
        "edit_file"
    }

    fn description(&self) -> &str {
        "Perform exact string replacement in a file. The old_string must match exactly \
         (including whitespace and indentation). If replace_all is true, all occurrences are replaced."
    }

    fn parameters_schema(&self) -> Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "path": {
                    "type": "string",
                    "description": "The path to the file to edit"
                },
                "old_string": {
                    "type": "string",
                    "description": "The exact string to find and replace"
                },
                "new_string": {
                    "type": "string",
                    "description": "The string to replace it with"
                },
                "replace_all": {
                    "type": "boolean",
                    "description": "If true, replace all occurrences (default: false)"
                }
            },
            "required": ["path", "old_string", "new_string"]
        })
    }

    async fn execute(&self, ctx: &ToolContext, arguments: &Map<String, Value>) -> Result<String, ToolError> {
        let raw = required_str(arguments, "path")?;
        let old = required_str(arguments, "old_string")?;
        let new = required_str(arguments, "new_string")?;
        let replace_all = arguments
            .get("replace_all")
            .and_then(Value::as_bool)
            .unwrap_or(false);

        let target = path::confine(&ctx.workspace, raw).map_err(|e| ToolError::PermissionDenied {
            tool_name: "edit_file".into(),
            reason: e.to_string(),
        })?;

        let original = tokio::fs::read_to_string(&target)
            .await
            .map_err(|e| failed(format!("failed to read file: {e}")))?;

        let (updated, count) = apply_edit(&original, old, new, replace_all)?;

        tokio::fs::write(&target, updated)
            .await
            .map_err(|e| failed(format!("failed to write file: {e}")))?;

        if replace_all && count > 1 {
            Ok(format!("Successfully replaced {count} occurrences in {raw}"))
        } else {
            Ok(format!("Successfully edited {raw}"))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use domiclaw_core::CancellationToken;

    fn args(path: &str, old: &str, new: &str, replace_all: Option<bool>) -> Map<String, Value> {
        let mut m = Map::new();
        m.insert("path".into(), Value::String(path.into()));
        m.insert("old_string".into(), Value::String(old.into()));
        m.insert("new_string".into(), Value::String(new.into()));
        if let Some(all) = replace_all {
            m.insert("replace_all".into(), Value::Bool(all));
        }
        m
    }

    #[test]
    fn ambiguous_match_requires_replace_all() {
        let err = apply_edit("a a a", "a", "b", false).unwrap_err();
        assert!(err.to_string().contains("found 3 times"));

        let (out, n) = apply_edit("a a a", "a", "b", true).unwrap();
        assert_eq!(out, "b b b");
        assert_eq!(n, 3);
    }

    #[test]
    fn absent_string_is_error() {
        assert!(apply_edit("hello", "world", "x", false).is_err());
    }

    #[tokio::test]
    async fn edits_unique_occurrence() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("main.go"), "fmt.Println(\"hi\")\n").unwrap();
        let ctx = ToolContext::new(dir.path(), CancellationToken::new());

        let out = EditFileTool
            .execute(&ctx, &args("main.go", "\"hi\"", "\"hello\"", None))
            .await
            .unwrap();
        assert_eq!(out, "Successfully edited main.go");
        assert_eq!(
            std::fs::read_to_string(dir.path().join("main.go")).unwrap(),
            "fmt.Println(\"hello\")\n"
        );
    }

    #[tokio::test]
    async fn replace_all_reports_count() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("x.txt"), "foo foo").unwrap();
        let ctx = ToolContext::new(dir.path(), CancellationToken::new());

        let out = EditFileTool
            .execute(&ctx, &args("x.txt", "foo", "bar", Some(true)))
            .await
            .unwrap();
        assert_eq!(out, "Successfully replaced 2 occurrences in x.txt");
    }

    #[tokio::test]
    async fn outside_workspace_denied() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = ToolContext::new(dir.path(), CancellationToken::new());
        let err = EditFileTool
            .execute(&ctx, &args("/etc/hosts", "a", "b", None))
            .await
            .unwrap_err();
        assert!(matches!(err, ToolError::PermissionDenied { .. }));
    }
}
