//! Configuration loading, validation, and management for DomiClaw.
//!
//! Loads configuration from `~/.domiclaw/config.toml` with environment
//! variable overrides. Validates all settings at startup.

use domiclaw_core::LoopConfig;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// The root configuration structure.
///
/// Maps directly to `~/.domiclaw/config.toml`.
#[derive(Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Directory the agent works in and keeps its memory files in.
    /// A leading `~` is expanded to the home directory.
    #[serde(default = "default_workspace")]
    pub workspace: String,

    /// Provider to use: "anthropic", "openrouter" or "openai_compat".
    /// When unset, the first provider with credentials wins.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider: Option<String>,

    /// Agent loop settings
    #[serde(default)]
    pub agent: AgentSettings,

    /// Provider credentials and endpoints
    #[serde(default)]
    pub providers: ProvidersConfig,

    /// Memory configuration
    #[serde(default)]
    pub memory: MemoryConfig,

    /// Checkpoint detection in model output
    #[serde(default)]
    pub strategic_compact: StrategicCompactConfig,

    /// Error classification markers
    #[serde(default)]
    pub errors: ErrorSignatureConfig,

    /// Tool settings
    #[serde(default)]
    pub tools: ToolsConfig,
}

fn default_workspace() -> String {
    "~/.domiclaw/workspace".into()
}

/// Redact a secret string for Debug output.
fn redact(s: &Option<String>) -> &'static str {
    match s {
        Some(_) => "[REDACTED]",
        None => "None",
    }
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("workspace", &self.workspace)
            .field("provider", &self.provider)
            .field("agent", &self.agent)
            .field("providers", &self.providers)
            .field("memory", &self.memory)
            .field("strategic_compact", &self.strategic_compact)
            .field("errors", &self.errors)
            .field("tools", &self.tools)
            .finish()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentSettings {
    #[serde(default = "default_model")]
    pub model: String,

    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,

    #[serde(default = "default_temperature")]
    pub temperature: f32,

    #[serde(default = "default_max_tool_iterations")]
    pub max_tool_iterations: u32,

    #[serde(default = "default_retry_attempts")]
    pub retry_attempts: u32,

    #[serde(default = "default_retry_backoff_ms")]
    pub retry_backoff_ms: u64,

    /// Largest single SSE line the streaming decoder will buffer
    #[serde(default = "default_max_sse_line_bytes")]
    pub max_sse_line_bytes: usize,
}

fn default_model() -> String {
    "claude-sonnet-4-20250514".into()
}
fn default_max_tokens() -> u32 {
    8192
}
fn default_temperature() -> f32 {
    0.7
}
fn default_max_tool_iterations() -> u32 {
    20
}
fn default_retry_attempts() -> u32 {
    3
}
fn default_retry_backoff_ms() -> u64 {
    2000
}
fn default_max_sse_line_bytes() -> usize {
    1024 * 1024
}

impl Default for AgentSettings {
    fn default() -> Self {
        Self {
            model: default_model(),
            max_tokens: default_max_tokens(),
            temperature: default_temperature(),
            max_tool_iterations: default_max_tool_iterations(),
            retry_attempts: default_retry_attempts(),
            retry_backoff_ms: default_retry_backoff_ms(),
            max_sse_line_bytes: default_max_sse_line_bytes(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProvidersConfig {
    #[serde(default)]
    pub anthropic: ProviderConfig,

    #[serde(default)]
    pub openrouter: ProviderConfig,

    /// Any other OpenAI-compatible endpoint
    #[serde(default)]
    pub openai_compat: ProviderConfig,
}

#[derive(Clone, Default, Serialize, Deserialize)]
pub struct ProviderConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_base: Option<String>,
}

impl ProviderConfig {
    pub fn is_configured(&self) -> bool {
        self.api_key.as_deref().is_some_and(|k| !k.is_empty())
    }
}

impl std::fmt::Debug for ProviderConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderConfig")
            .field("api_key", &redact(&self.api_key))
            .field("api_base", &self.api_base)
            .finish()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoryConfig {
    /// Days of daily notes included in the memory context
    #[serde(default = "default_daily_notes_days")]
    pub daily_notes_days: u32,
}

fn default_daily_notes_days() -> u32 {
    3
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            daily_notes_days: default_daily_notes_days(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StrategicCompactConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,

    #[serde(default = "default_boundary_patterns")]
    pub boundary_patterns: Vec<String>,
}

fn default_true() -> bool {
    true
}
fn default_boundary_patterns() -> Vec<String> {
    ["Phase complete", "Moving to", "Task done", "Checkpoint"]
        .into_iter()
        .map(String::from)
        .collect()
}

impl Default for StrategicCompactConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            boundary_patterns: default_boundary_patterns(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorSignatureConfig {
    #[serde(default = "domiclaw_core::agent::default_overflow_markers")]
    pub overflow_markers: Vec<String>,

    #[serde(default = "domiclaw_core::agent::default_rate_limit_markers")]
    pub rate_limit_markers: Vec<String>,
}

impl Default for ErrorSignatureConfig {
    fn default() -> Self {
        Self {
            overflow_markers: domiclaw_core::agent::default_overflow_markers(),
            rate_limit_markers: domiclaw_core::agent::default_rate_limit_markers(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolsConfig {
    #[serde(default = "default_exec_timeout_secs")]
    pub exec_timeout_secs: u64,

    #[serde(default)]
    pub search: SearchConfig,
}

fn default_exec_timeout_secs() -> u64 {
    120
}

impl Default for ToolsConfig {
    fn default() -> Self {
        Self {
            exec_timeout_secs: default_exec_timeout_secs(),
            search: SearchConfig::default(),
        }
    }
}

#[derive(Clone, Serialize, Deserialize)]
pub struct SearchConfig {
    /// Brave key, or a Tavily key (prefix `tvly-`)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    #[serde(default = "default_max_results")]
    pub max_results: usize,
}

fn default_max_results() -> usize {
    5
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            max_results: default_max_results(),
        }
    }
}

impl std::fmt::Debug for SearchConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SearchConfig")
            .field("api_key", &redact(&self.api_key))
            .field("max_results", &self.max_results)
            .finish()
    }
}

impl AppConfig {
    /// Load configuration from the default path (~/.domiclaw/config.toml),
    /// then apply environment overrides:
    /// - `ANTHROPIC_API_KEY`, `ANTHROPIC_BASE_URL`
    /// - `OPENROUTER_API_KEY`
    /// - `OPENAI_COMPAT_API_KEY`, `OPENAI_COMPAT_BASE_URL`
    /// - `BRAVE_API_KEY` / `TAVILY_API_KEY`
    /// - `DOMICLAW_MODEL`, `DOMICLAW_WORKSPACE`, `DOMICLAW_PROVIDER`
    pub fn load() -> Result<Self, ConfigError> {
        let mut config = Self::load_from(&Self::config_path())?;
        config.apply_env(|key| std::env::var(key).ok().filter(|v| !v.is_empty()));
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a specific file path.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            tracing::info!("No config file found at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        let config: Self = toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        config.validate()?;
        Ok(config)
    }

    /// Apply overrides from an environment lookup. Environment values beat
    /// file values.
    pub fn apply_env(&mut self, env: impl Fn(&str) -> Option<String>) {
        if let Some(key) = env("ANTHROPIC_API_KEY") {
            self.providers.anthropic.api_key = Some(key);
        }
        if let Some(base) = env("ANTHROPIC_BASE_URL") {
            self.providers.anthropic.api_base = Some(base);
        }
        if let Some(key) = env("OPENROUTER_API_KEY") {
            self.providers.openrouter.api_key = Some(key);
        }
        if let Some(key) = env("OPENAI_COMPAT_API_KEY") {
            self.providers.openai_compat.api_key = Some(key);
        }
        if let Some(base) = env("OPENAI_COMPAT_BASE_URL") {
            self.providers.openai_compat.api_base = Some(base);
        }
        if let Some(key) = env("BRAVE_API_KEY").or_else(|| env("TAVILY_API_KEY")) {
            self.tools.search.api_key = Some(key);
        }
        if let Some(model) = env("DOMICLAW_MODEL") {
            self.agent.model = model;
        }
        if let Some(workspace) = env("DOMICLAW_WORKSPACE") {
            self.workspace = workspace;
        }
        if let Some(provider) = env("DOMICLAW_PROVIDER") {
            self.provider = Some(provider);
        }
    }

    /// Get the configuration directory path.
    pub fn config_dir() -> PathBuf {
        dirs_home().join(".domiclaw")
    }

    /// Get the configuration file path.
    pub fn config_path() -> PathBuf {
        Self::config_dir().join("config.toml")
    }

    /// The workspace directory with `~` expanded.
    pub fn workspace_path(&self) -> PathBuf {
        expand_home(&self.workspace)
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(0.0..=2.0).contains(&self.agent.temperature) {
            return Err(ConfigError::ValidationError(
                "agent.temperature must be between 0.0 and 2.0".into(),
            ));
        }
        if self.agent.max_tool_iterations == 0 {
            return Err(ConfigError::ValidationError(
                "agent.max_tool_iterations must be > 0".into(),
            ));
        }
        if self.agent.retry_attempts == 0 {
            return Err(ConfigError::ValidationError(
                "agent.retry_attempts must be > 0".into(),
            ));
        }
        if self.agent.max_sse_line_bytes < 16 * 1024 {
            return Err(ConfigError::ValidationError(
                "agent.max_sse_line_bytes must be at least 16384".into(),
            ));
        }
        if let Some(provider) = &self.provider
            && !matches!(provider.as_str(), "anthropic" | "openrouter" | "openai_compat")
        {
            return Err(ConfigError::ValidationError(format!(
                "unknown provider '{provider}'"
            )));
        }
        Ok(())
    }

    /// Check if any provider has an API key.
    pub fn has_api_key(&self) -> bool {
        self.providers.anthropic.is_configured()
            || self.providers.openrouter.is_configured()
            || self.providers.openai_compat.is_configured()
    }

    /// Settings for one agent loop.
    pub fn loop_config(&self) -> LoopConfig {
        let boundary_patterns = if self.strategic_compact.enabled {
            self.strategic_compact.boundary_patterns.clone()
        } else {
            Vec::new()
        };
        LoopConfig {
            model: self.agent.model.clone(),
            max_tokens: self.agent.max_tokens,
            temperature: self.agent.temperature,
            max_tool_iterations: self.agent.max_tool_iterations,
            retry_attempts: self.agent.retry_attempts,
            retry_backoff_ms: self.agent.retry_backoff_ms,
            daily_notes_days: self.memory.daily_notes_days,
            boundary_patterns,
            overflow_markers: self.errors.overflow_markers.clone(),
            rate_limit_markers: self.errors.rate_limit_markers.clone(),
            system_prompt: None,
        }
    }

    /// Generate a default config TOML string (for the `init` command).
    pub fn default_toml() -> String {
        let config = Self::default();
        toml::to_string_pretty(&config).unwrap_or_default()
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            workspace: default_workspace(),
            provider: None,
            agent: AgentSettings::default(),
            providers: ProvidersConfig::default(),
            memory: MemoryConfig::default(),
            strategic_compact: StrategicCompactConfig::default(),
            errors: ErrorSignatureConfig::default(),
            tools: ToolsConfig::default(),
        }
    }
}

/// Expand a leading `~` to the home directory.
pub fn expand_home(path: &str) -> PathBuf {
    if path == "~" {
        return dirs_home();
    }
    match path.strip_prefix("~/") {
        Some(rest) => dirs_home().join(rest),
        None => PathBuf::from(path),
    }
}

/// Get the user's home directory.
fn dirs_home() -> PathBuf {
    #[cfg(target_os = "windows")]
    {
        std::env::var("USERPROFILE")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("C:\\Users\\Default"))
    }
    #[cfg(not(target_os = "windows"))]
    {
        std::env::var("HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("/tmp"))
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file at {path}: {reason}")]
    ReadError { path: PathBuf, reason: String },

    #[error("Failed to parse config file at {path}: {reason}")]
    ParseError { path: PathBuf, reason: String },

    #[error("Configuration validation failed: {0}")]
    ValidationError(String),
}
