//! Exec tool: run shell commands in the workspace.
//!
//! Commands matching a small block-list of destructive patterns are refused.
//! Every run is bounded by a timeout and by the loop's cancellation token;
//! the child is killed when either fires.

use std::time::Duration;

use async_trait::async_trait;
use domiclaw_core::error::ToolError;
use domiclaw_core::tool::{Tool, ToolContext};
use serde_json::{Map, Value};
use tokio::process::Command;
use tracing::{debug, warn};

use crate::required_str;

/// Substrings that are never allowed in a command (matched case-insensitively).
const DANGEROUS_PATTERNS: &[&str] = &[
    "rm -rf /",
    "rm -rf /*",
    "rm -rf ~",
    "rm -rf $HOME",
    "mkfs.",
    "dd if=",
    ":(){:|:&};:",
    "> /dev/sda",
    "chmod -R 777 /",
    "chown -R",
];

/// Execute shell commands with a block-list and a timeout.
pub struct ExecTool {
    timeout: Duration,
}

impl ExecTool {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }

    fn blocked_pattern(command: &str) -> Option<&'static str> {
        let lower = command.to_lowercase();
        DANGEROUS_PATTERNS
            .iter()
            .copied()
            .find(|p| lower.contains(&p.to_lowercase()))
    }
}

impl Default for ExecTool {
    fn default() -> Self {
        Self::new(Duration::from_secs(120))
    }
}

#[async_trait]
impl Tool for ExecTool {
    fn name(&self) -> &str { "exec" }

    fn description(&self) -> &str {
        "Execute a shell command and return its output. Use for running build commands, git operations, etc."
    }

    fn parameters_schema(&self) -> Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "command": {
                    "type": "string",
                    "description": "The shell command to execute"
                },
                "workdir": {
                    "type": "string",
                    "description": "Working directory for the command (optional)"
                }
            },
            "required": ["command"]
        })
    }

    async fn execute(&self, ctx: &ToolContext, arguments: &Map<String, Value>) -> Result<String, ToolError> {
        let command = required_str(arguments, "command")?;

        if let Some(pattern) = Self::blocked_pattern(command) {
            warn!(command = %command, pattern, "Blocked dangerous command");
            return Err(ToolError::PermissionDenied {
                tool_name: "exec".into(),
                reason: format!("dangerous command blocked: {pattern}"),
            });
        }

        let workdir = match arguments.get("workdir").and_then(Value::as_str) {
            Some(wd) if !wd.is_empty() => crate::path::resolve(&ctx.workspace, wd),
            _ => ctx.workspace.clone(),
        };

        debug!(command = %command, workdir = %workdir.display(), "Executing shell command");

        let mut cmd = if cfg!(target_os = "windows") {
            let mut c = Command::new("cmd");
            c.args(["/C", command]);
            c
        } else {
            let mut c = Command::new("sh");
            c.args(["-c", command]);
            c
        };
        cmd.current_dir(&workdir).kill_on_drop(true);

        let output = tokio::select! {
            biased;
            _ = ctx.cancel.cancelled() => return Err(ToolError::Cancelled),
            res = tokio::time::timeout(self.timeout, cmd.output()) => match res {
                Ok(out) => out.map_err(|e| ToolError::ExecutionFailed {
                    tool_name: "exec".into(),
                    reason: e.to_string(),
                })?,
                Err(_) => {
                    warn!(command = %command, "Command timed out");
                    return Err(ToolError::Timeout {
                        tool_name: "exec".into(),
                        timeout_secs: self.timeout.as_secs(),
                    });
                }
            },
        };

        let stdout = String::from_utf8_lossy(&output.stdout);
        let stderr = String::from_utf8_lossy(&output.stderr);

        let mut result = stdout.into_owned();
        if !stderr.is_empty() {
            if !result.is_empty() {
                result.push('\n');
            }
            result.push_str("stderr:\n");
            result.push_str(&stderr);
        }

        if !output.status.success() {
            let code = output.status.code().unwrap_or(-1);
            warn!(command = %command, exit_code = code, "Command failed");
            return Err(ToolError::ExecutionFailed {
                tool_name: "exec".into(),
                reason: format!("command failed with exit code {code}\n{result}"),
            });
        }

        Ok(result)
    }
}
