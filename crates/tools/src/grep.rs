//! Grep tool: regex search over file contents.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use domiclaw_core::CancellationToken;
use domiclaw_core::error::ToolError;
use domiclaw_core::tool::{Tool, ToolContext};
use globset::{Glob, GlobMatcher};
use regex::Regex;
use serde_json::{Map, Value};
use walkdir::{DirEntry, WalkDir};

use crate::{path, required_str};

const MAX_MATCHES: usize = 100;
const MAX_FILE_BYTES: u64 = 1024 * 1024;
const MAX_LINE_CHARS: usize = 200;

/// Directories never descended into.
const SKIPPED_DIRS: &[&str] = &["node_modules", "vendor", "__pycache__", "target"];

struct Match {
    file: PathBuf,
    line: usize,
    content: String,
}

/// Searches file contents under a directory with a regular expression.
pub struct GrepTool;

#[async_trait]
impl Tool for GrepTool {
    fn name(&self) -> &str {
        "grep"
    }

    fn description(&self) -> &str {
        "Search file contents using a regular expression pattern. \
         Returns matching lines with file paths and line numbers. \
         Supports standard regex syntax (e.g. \"log.*Error\", \"fn\\s+\\w+\")."
    }

    fn parameters_schema(&self) -> Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "pattern": {
                    "type": "string",
                    "description": "Regular expression pattern to search for"
                },
                "path": {
                    "type": "string",
                    "description": "Directory to search in (defaults to the workspace)"
                },
                "include": {
                    "type": "string",
                    "description": "File name pattern to include (e.g. '*.rs', '*.{ts,tsx}')"
                }
            },
            "required": ["pattern"]
        })
    }

    async fn execute(&self, ctx: &ToolContext, arguments: &Map<String, Value>) -> Result<String, ToolError> {
        let pattern = required_str(arguments, "pattern")?;
        let re = Regex::new(pattern)
            .map_err(|e| ToolError::InvalidArguments(format!("invalid regex pattern: {e}")))?;

        let include = match arguments.get("include").and_then(Value::as_str) {
            Some(glob) if !glob.is_empty() => Some(
                Glob::new(glob)
                    .map_err(|e| ToolError::InvalidArguments(format!("invalid include pattern: {e}")))?
                    .compile_matcher(),
            ),
            _ => None,
        };

        let base = match arguments.get("path").and_then(Value::as_str) {
            Some(p) if !p.is_empty() => path::resolve(&ctx.workspace, p),
            _ => ctx.workspace.clone(),
        };

        let cancel = ctx.cancel.clone();
        let search = tokio::task::spawn_blocking(move || search(&base, &re, include.as_ref(), &cancel));

        let matches = tokio::select! {
            biased;
            _ = ctx.cancel.cancelled() => return Err(ToolError::Cancelled),
            joined = search => joined.map_err(|e| ToolError::ExecutionFailed {
                tool_name: "grep".into(),
                reason: format!("search failed: {e}"),
            })?,
        };

        Ok(format_matches(&matches))
    }
}

fn search(base: &Path, re: &Regex, include: Option<&GlobMatcher>, cancel: &CancellationToken) -> Vec<Match> {
    let mut matches = Vec::new();

    let walker = WalkDir::new(base)
        .into_iter()
        .filter_entry(|e| e.depth() == 0 || !is_skipped_dir(e));

    // Unreadable entries are skipped, not fatal.
    for entry in walker.filter_map(Result::ok) {
        if cancel.is_cancelled() || matches.len() >= MAX_MATCHES {
            break;
        }
        if !entry.file_type().is_file() {
            continue;
        }
        if entry.metadata().map(|m| m.len() > MAX_FILE_BYTES).unwrap_or(true) {
            continue;
        }
        if let Some(glob) = include
            && !glob.is_match(entry.file_name())
        {
            continue;
        }
        // Binary files fail UTF-8 decoding and are skipped.
        let Ok(text) = std::fs::read_to_string(entry.path()) else {
            continue;
        };

        for (idx, line) in text.lines().enumerate() {
            if re.is_match(line) {
                matches.push(Match {
                    file: entry.path().to_path_buf(),
                    line: idx + 1,
                    content: clip_line(line),
                });
                if matches.len() >= MAX_MATCHES {
                    break;
                }
            }
        }
    }
    matches
}

fn is_skipped_dir(entry: &DirEntry) -> bool {
    if !entry.file_type().is_dir() {
        return false;
    }
    let name = entry.file_name().to_string_lossy();
    name.starts_with('.') || SKIPPED_DIRS.contains(&name.as_ref())
}

fn clip_line(line: &str) -> String {
    if line.chars().count() <= MAX_LINE_CHARS {
        return line.trim().to_string();
    }
    let head: String = line.chars().take(MAX_LINE_CHARS - 3).collect();
    format!("{}...", head.trim())
}

fn format_matches(matches: &[Match]) -> String {
    let mut out = format!("Found {} matches:\n\n", matches.len());
    for m in matches {
        out.push_str(&format!("{}:{}: {}\n", m.file.display(), m.line, m.content));
    }
    if matches.len() >= MAX_MATCHES {
        out.push_str("\n... (results truncated)");
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn args(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            _ => Map::new(),
        }
    }

    fn workspace() -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("src")).unwrap();
        std::fs::write(dir.path().join("src/main.rs"), "fn main() {\n    run();\n}\n").unwrap();
        std::fs::write(dir.path().join("src/app.ts"), "function run() {}\n").unwrap();
        std::fs::write(dir.path().join("notes.md"), "run the tests\n").unwrap();
        dir
    }

    #[tokio::test]
    async fn finds_lines_with_numbers() {
        let dir = workspace();
        let ctx = ToolContext::new(dir.path(), CancellationToken::new());

        let out = GrepTool.execute(&ctx, &args(json!({"pattern": r"fn\s+main"}))).await.unwrap();
        assert!(out.starts_with("Found 1 matches:\n\n"));
        assert!(out.contains("main.rs:1: fn main() {"));
    }

    #[tokio::test]
    async fn include_filter_supports_alternatives() {
        let dir = workspace();
        let ctx = ToolContext::new(dir.path(), CancellationToken::new());

        let out = GrepTool
            .execute(&ctx, &args(json!({"pattern": "run", "include": "*.{rs,ts}"})))
            .await
            .unwrap();
        assert!(out.starts_with("Found 2 matches:"));
        assert!(out.contains("main.rs:2: run();"));
        assert!(out.contains("app.ts:1: function run() {}"));
        assert!(!out.contains("notes.md"));
    }

    #[tokio::test]
    async fn skips_hidden_and_vendor_dirs() {
        let dir = workspace();
        std::fs::create_dir_all(dir.path().join(".git")).unwrap();
        std::fs::write(dir.path().join(".git/config"), "needle\n").unwrap();
        std::fs::create_dir_all(dir.path().join("node_modules/x")).unwrap();
        std::fs::write(dir.path().join("node_modules/x/index.js"), "needle\n").unwrap();
        let ctx = ToolContext::new(dir.path(), CancellationToken::new());

        let out = GrepTool.execute(&ctx, &args(json!({"pattern": "needle"}))).await.unwrap();
        assert!(out.starts_with("Found 0 matches:"));
    }

    #[tokio::test]
    async fn results_are_capped() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("big.txt"), "hit\n".repeat(150)).unwrap();
        let ctx = ToolContext::new(dir.path(), CancellationToken::new());

        let out = GrepTool.execute(&ctx, &args(json!({"pattern": "hit"}))).await.unwrap();
        assert!(out.starts_with("Found 100 matches:"));
        assert!(out.ends_with("... (results truncated)"));
    }

    #[tokio::test]
    async fn invalid_regex_is_argument_error() {
        let dir = workspace();
        let ctx = ToolContext::new(dir.path(), CancellationToken::new());

        let err = GrepTool.execute(&ctx, &args(json!({"pattern": "("}))).await.unwrap_err();
        assert!(matches!(err, ToolError::InvalidArguments(_)));
        assert!(err.to_string().contains("invalid regex pattern"));
    }

    #[test]
    fn long_lines_are_clipped() {
        let line = "x".repeat(500);
        let clipped = clip_line(&line);
        assert_eq!(clipped.chars().count(), MAX_LINE_CHARS);
        assert!(clipped.ends_with("..."));
    }
}
