//! Built-in tool implementations for DomiClaw.
//!
//! Tools give the agent the ability to interact with its workspace:
//! run shell commands, read and edit files, list directories, search file
//! names and contents, and search the web.

pub mod exec;
pub mod file_edit;
pub mod file_read;
pub mod file_write;
pub mod glob;
pub mod grep;
pub mod list_dir;
pub mod path;
pub mod web_search;

use std::time::Duration;

use domiclaw_config::ToolsConfig;
use domiclaw_core::error::ToolError;
use domiclaw_core::tool::ToolRegistry;
use serde_json::{Map, Value};

pub use exec::ExecTool;
pub use file_edit::EditFileTool;
pub use file_read::ReadFileTool;
pub use file_write::WriteFileTool;
pub use glob::GlobTool;
pub use grep::GrepTool;
pub use list_dir::ListDirTool;
pub use web_search::WebSearchTool;

/// Names other agent harnesses use for the same capabilities.
pub const DEFAULT_ALIASES: &[(&str, &str)] = &[
    ("Bash", "exec"),
    ("shell", "exec"),
    ("Read", "read_file"),
    ("Write", "write_file"),
    ("Edit", "edit_file"),
    ("LS", "list_dir"),
    ("Grep", "grep"),
    ("Glob", "glob"),
    ("WebSearch", "web_search"),
];

/// Create a registry with every built-in tool and the standard aliases.
pub fn default_registry(config: &ToolsConfig) -> ToolRegistry {
    let mut registry = ToolRegistry::new();
    registry.register(Box::new(ExecTool::new(Duration::from_secs(
        config.exec_timeout_secs,
    ))));
    registry.register(Box::new(ReadFileTool));
    registry.register(Box::new(WriteFileTool));
    registry.register(Box::new(EditFileTool));
    registry.register(Box::new(ListDirTool));
    registry.register(Box::new(GrepTool));
    registry.register(Box::new(GlobTool));
    registry.register(Box::new(WebSearchTool::new(
        config.search.api_key.clone().unwrap_or_default(),
        config.search.max_results,
    )));

    for (alias, canonical) in DEFAULT_ALIASES {
        registry.register_alias(alias, canonical);
    }
    registry
}

/// Fetch a required string argument.
pub(crate) fn required_str<'a>(
    arguments: &'a Map<String, Value>,
    key: &str,
) -> Result<&'a str, ToolError> {
    arguments
        .get(key)
        .and_then(Value::as_str)
        .ok_or_else(|| ToolError::InvalidArguments(format!("{key} must be a string")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registry_has_all_tools() {
        let registry = default_registry(&ToolsConfig::default());
        assert_eq!(
            registry.list(),
            vec![
                "edit_file",
                "exec",
                "glob",
                "grep",
                "list_dir",
                "read_file",
                "web_search",
                "write_file"
            ]
        );
        assert_eq!(registry.definitions().len(), 8);
    }

    #[test]
    fn aliases_resolve_case_insensitively() {
        let registry = default_registry(&ToolsConfig::default());
        assert_eq!(registry.resolve_name("Bash"), "exec");
        assert_eq!(registry.resolve_name("bash"), "exec");
        assert_eq!(registry.resolve_name("SHELL"), "exec");
        assert_eq!(registry.resolve_name("Read"), "read_file");
        assert_eq!(registry.resolve_name("ls"), "list_dir");
        assert_eq!(registry.resolve_name("WebSearch"), "web_search");
        assert_eq!(registry.resolve_name("Grep"), "grep");
        assert_eq!(registry.resolve_name("GLOB"), "glob");
        assert_eq!(registry.resolve_name("browser"), "browser");
    }

    #[test]
    fn required_str_reports_key() {
        let args = Map::new();
        let err = required_str(&args, "path").unwrap_err();
        assert!(err.to_string().contains("path must be a string"));
    }
}
