//! Glob tool: find files by name pattern.

use std::path::{Path, PathBuf};
use std::time::SystemTime;

use async_trait::async_trait;
use domiclaw_core::CancellationToken;
use domiclaw_core::error::ToolError;
use domiclaw_core::tool::{Tool, ToolContext};
use globset::{GlobBuilder, GlobMatcher};
use serde_json::{Map, Value};
use walkdir::WalkDir;

use crate::{path, required_str};

const MAX_LISTED: usize = 100;

/// Finds files whose workspace-relative path matches a glob pattern.
///
/// `*` stays within one path segment; `**` spans any number of segments,
/// including none. Results are ordered newest first.
pub struct GlobTool;

#[async_trait]
impl Tool for GlobTool {
    fn name(&self) -> &str {
        "glob"
    }

    fn description(&self) -> &str {
        "Find files matching a glob pattern. Supports ** for recursive matching \
         (e.g. \"**/*.rs\", \"src/**/*.ts\"). Returns file paths sorted by \
         modification time, newest first."
    }

    fn parameters_schema(&self) -> Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "pattern": {
                    "type": "string",
                    "description": "Glob pattern to match files (e.g. '**/*.rs', '*.toml')"
                },
                "path": {
                    "type": "string",
                    "description": "Directory to search in (defaults to the workspace)"
                }
            },
            "required": ["pattern"]
        })
    }

    async fn execute(&self, ctx: &ToolContext, arguments: &Map<String, Value>) -> Result<String, ToolError> {
        let pattern = required_str(arguments, "pattern")?;
        let matcher = GlobBuilder::new(pattern)
            .literal_separator(true)
            .build()
            .map_err(|e| ToolError::InvalidArguments(format!("invalid glob pattern: {e}")))?
            .compile_matcher();
        let max_depth = search_depth(pattern);

        let base = match arguments.get("path").and_then(Value::as_str) {
            Some(p) if !p.is_empty() => path::resolve(&ctx.workspace, p),
            _ => ctx.workspace.clone(),
        };

        let cancel = ctx.cancel.clone();
        let search = tokio::task::spawn_blocking(move || find(&base, &matcher, max_depth, &cancel));

        let mut found = tokio::select! {
            biased;
            _ = ctx.cancel.cancelled() => return Err(ToolError::Cancelled),
            joined = search => joined.map_err(|e| ToolError::ExecutionFailed {
                tool_name: "glob".into(),
                reason: format!("search failed: {e}"),
            })?,
        };

        found.sort_by(|a, b| b.1.cmp(&a.1));
        Ok(format_files(&found))
    }
}

/// Patterns without `**` cannot match deeper than their own segment count.
fn search_depth(pattern: &str) -> usize {
    if pattern.contains("**") {
        usize::MAX
    } else {
        pattern.split('/').filter(|s| !s.is_empty()).count()
    }
}

fn find(base: &Path, matcher: &GlobMatcher, max_depth: usize, cancel: &CancellationToken) -> Vec<(PathBuf, SystemTime)> {
    let mut found = Vec::new();
    for entry in WalkDir::new(base).max_depth(max_depth).into_iter().filter_map(Result::ok) {
        if cancel.is_cancelled() {
            break;
        }
        if !entry.file_type().is_file() {
            continue;
        }
        let Ok(relative) = entry.path().strip_prefix(base) else {
            continue;
        };
        if !matcher.is_match(relative) {
            continue;
        }
        let modified = entry
            .metadata()
            .ok()
            .and_then(|m| m.modified().ok())
            .unwrap_or(SystemTime::UNIX_EPOCH);
        found.push((entry.into_path(), modified));
    }
    found
}

fn format_files(found: &[(PathBuf, SystemTime)]) -> String {
    let mut out = format!("Found {} files:\n\n", found.len());
    for (file, _) in found.iter().take(MAX_LISTED) {
        out.push_str(&format!("{}\n", file.display()));
    }
    if found.len() > MAX_LISTED {
        out.push_str(&format!("\n... and {} more files", found.len() - MAX_LISTED));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::time::Duration;

    fn args(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            _ => Map::new(),
        }
    }

    fn workspace() -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("src/nested")).unwrap();
        std::fs::write(dir.path().join("Cargo.toml"), "").unwrap();
        std::fs::write(dir.path().join("lib.rs"), "").unwrap();
        std::fs::write(dir.path().join("src/main.rs"), "").unwrap();
        std::fs::write(dir.path().join("src/nested/deep.rs"), "").unwrap();
        dir
    }

    #[tokio::test]
    async fn double_star_spans_directories() {
        let dir = workspace();
        let ctx = ToolContext::new(dir.path(), CancellationToken::new());

        let out = GlobTool.execute(&ctx, &args(json!({"pattern": "**/*.rs"}))).await.unwrap();
        assert!(out.starts_with("Found 3 files:\n\n"));
        assert!(out.contains("lib.rs"));
        assert!(out.contains("main.rs"));
        assert!(out.contains("deep.rs"));
    }

    #[tokio::test]
    async fn prefixed_double_star_stays_under_prefix() {
        let dir = workspace();
        let ctx = ToolContext::new(dir.path(), CancellationToken::new());

        let out = GlobTool.execute(&ctx, &args(json!({"pattern": "src/**/*.rs"}))).await.unwrap();
        assert!(out.starts_with("Found 2 files:"));
        assert!(!out.contains("lib.rs"));
    }

    #[tokio::test]
    async fn single_star_matches_top_level_only() {
        let dir = workspace();
        let ctx = ToolContext::new(dir.path(), CancellationToken::new());

        let out = GlobTool.execute(&ctx, &args(json!({"pattern": "*.rs"}))).await.unwrap();
        assert!(out.starts_with("Found 1 files:"));
        assert!(out.contains("lib.rs"));
    }

    #[tokio::test]
    async fn newest_first() {
        let dir = tempfile::tempdir().unwrap();
        let old = dir.path().join("old.txt");
        let new = dir.path().join("new.txt");
        std::fs::write(&old, "").unwrap();
        std::fs::write(&new, "").unwrap();
        let past = SystemTime::now() - Duration::from_secs(3600);
        std::fs::File::options().write(true).open(&old).unwrap().set_modified(past).unwrap();
        let ctx = ToolContext::new(dir.path(), CancellationToken::new());

        let out = GlobTool.execute(&ctx, &args(json!({"pattern": "*.txt"}))).await.unwrap();
        let new_at = out.find("new.txt").unwrap();
        let old_at = out.find("old.txt").unwrap();
        assert!(new_at < old_at);
    }

    #[tokio::test]
    async fn long_listings_are_truncated() {
        let dir = tempfile::tempdir().unwrap();
        for i in 0..105 {
            std::fs::write(dir.path().join(format!("f{i}.log")), "").unwrap();
        }
        let ctx = ToolContext::new(dir.path(), CancellationToken::new());

        let out = GlobTool.execute(&ctx, &args(json!({"pattern": "*.log"}))).await.unwrap();
        assert!(out.starts_with("Found 105 files:"));
        assert!(out.ends_with("\n... and 5 more files"));
    }

    #[tokio::test]
    async fn invalid_pattern_is_argument_error() {
        let dir = workspace();
        let ctx = ToolContext::new(dir.path(), CancellationToken::new());

        let err = GlobTool.execute(&ctx, &args(json!({"pattern": "[a-"}))).await.unwrap_err();
        assert!(matches!(err, ToolError::InvalidArguments(_)));
    }

    #[test]
    fn depth_follows_segments() {
        assert_eq!(search_depth("*.rs"), 1);
        assert_eq!(search_depth("src/*.rs"), 2);
        assert_eq!(search_depth("**/*.rs"), usize::MAX);
    }
}
