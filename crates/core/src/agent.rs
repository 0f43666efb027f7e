//! Agent loop configuration and run outcome types.

use serde::{Deserialize, Serialize};

use crate::provider::Usage;

/// Construction-time settings for one agent loop.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoopConfig {
    /// Model identifier passed to the provider
    pub model: String,

    /// Maximum output tokens per model call
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,

    /// Sampling temperature
    #[serde(default = "default_temp")]
    pub temperature: f32,

    /// Maximum model calls per run (safety limit)
    #[serde(default = "default_max_iterations")]
    pub max_tool_iterations: u32,

    /// Attempt cap for rate-limited model calls
    #[serde(default = "default_retry_attempts")]
    pub retry_attempts: u32,

    /// Backoff base; the n-th wait lasts `base * n`
    #[serde(default = "default_retry_backoff_ms")]
    pub retry_backoff_ms: u64,

    /// Number of days of daily notes included in memory context
    #[serde(default = "default_daily_notes_days")]
    pub daily_notes_days: u32,

    /// Substrings in assistant text that mark a checkpoint. Empty disables the scan.
    #[serde(default)]
    pub boundary_patterns: Vec<String>,

    /// Lowercase substrings identifying a context-overflow error
    #[serde(default = "default_overflow_markers")]
    pub overflow_markers: Vec<String>,

    /// Lowercase substrings identifying a rate-limit error
    #[serde(default = "default_rate_limit_markers")]
    pub rate_limit_markers: Vec<String>,

    /// Overrides the built-in system prompt
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system_prompt: Option<String>,
}

fn default_max_tokens() -> u32 {
    8192
}
fn default_temp() -> f32 {
    0.7
}
fn default_max_iterations() -> u32 {
    20
}
fn default_retry_attempts() -> u32 {
    3
}
fn default_retry_backoff_ms() -> u64 {
    2000
}
fn default_daily_notes_days() -> u32 {
    3
}

pub fn default_overflow_markers() -> Vec<String> {
    [
        "context_length_exceeded",
        "maximum context length",
        "token limit",
        "too many tokens",
    ]
    .into_iter()
    .map(String::from)
    .collect()
}

pub fn default_rate_limit_markers() -> Vec<String> {
    ["rate_limit", "rate limit", "too many"]
        .into_iter()
        .map(String::from)
        .collect()
}

impl Default for LoopConfig {
    fn default() -> Self {
        Self {
            model: "claude-sonnet-4-20250514".into(),
            max_tokens: default_max_tokens(),
            temperature: default_temp(),
            max_tool_iterations: default_max_iterations(),
            retry_attempts: default_retry_attempts(),
            retry_backoff_ms: default_retry_backoff_ms(),
            daily_notes_days: default_daily_notes_days(),
            boundary_patterns: Vec::new(),
            overflow_markers: default_overflow_markers(),
            rate_limit_markers: default_rate_limit_markers(),
            system_prompt: None,
        }
    }
}

/// How a run that returned successfully ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    /// The model produced a tool-free answer
    Completed,
    /// The iteration cap was hit first; the transcript holds partial progress
    IterationLimit,
}

/// Summary of one `run` / `run_continue` call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunOutcome {
    /// Final assistant text (empty when the cap was hit)
    pub text: String,

    /// Model calls made
    pub iterations: u32,

    /// Token usage summed over all model calls
    pub usage: Usage,

    pub status: RunStatus,
}
