//! Error types for the DomiClaw domain.
//!
//! Uses `thiserror` for ergonomic error definitions.
//! Each bounded context has its own error variant.

use thiserror::Error;

/// The top-level error type for all DomiClaw operations.
#[derive(Debug, Error)]
pub enum Error {
    // --- Provider errors ---
    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),

    // --- Tool errors ---
    #[error("Tool error: {0}")]
    Tool(#[from] ToolError),

    // --- Configuration errors ---
    #[error("Configuration error: {message}")]
    Config { message: String },

    // --- Loop control ---
    #[error("agent loop is already running")]
    AlreadyRunning,

    /// The model ran out of context. Recovery state has been written and the
    /// operator should start a fresh run through the resume path.
    #[error("context overflow - run 'domiclaw resume' to continue")]
    ContextOverflow { session_id: String },

    #[error("operation cancelled")]
    Cancelled,

    #[error("agent stopped")]
    Stopped,
}

/// Result type alias using our Error.
pub type Result<T> = std::result::Result<T, Error>;

// --- Bounded context errors ---

#[derive(Debug, Clone, Error)]
pub enum ProviderError {
    /// Transport-level failure (DNS, TLS, connection reset, body read).
    #[error("Network error: {0}")]
    Network(String),

    #[error("Rate limited: {message}")]
    RateLimited { message: String },

    /// Vendor-reported failure. `error_type` is filled when the vendor
    /// returned a structured error body.
    #[error("{}", api_error_message(*status_code, error_type.as_deref(), message))]
    Api {
        status_code: u16,
        error_type: Option<String>,
        message: String,
    },

    #[error("Failed to parse provider response: {0}")]
    Parse(String),

    /// An `error` event arrived mid-stream.
    #[error("stream error: {error_type} - {message}")]
    Stream { error_type: String, message: String },

    #[error("SSE line exceeds maximum size of {limit} bytes")]
    LineTooLong { limit: usize },

    #[error("Provider not configured: {0}")]
    NotConfigured(String),

    #[error("request cancelled")]
    Cancelled,
}

fn api_error_message(status_code: u16, error_type: Option<&str>, message: &str) -> String {
    match error_type {
        Some(t) => format!("API error: {t} - {message} (status: {status_code})"),
        None => format!("API request failed with status {status_code}: {message}"),
    }
}

impl ProviderError {
    /// The vendor error type, if the failure carried one.
    pub fn error_type(&self) -> Option<&str> {
        match self {
            ProviderError::Api { error_type, .. } => error_type.as_deref(),
            ProviderError::Stream { error_type, .. } => Some(error_type),
            _ => None,
        }
    }

    /// The HTTP status, if the failure came from a response.
    pub fn status_code(&self) -> Option<u16> {
        match self {
            ProviderError::Api { status_code, .. } => Some(*status_code),
            ProviderError::RateLimited { .. } => Some(429),
            _ => None,
        }
    }
}

#[derive(Debug, Error)]
pub enum MemoryError {
    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl From<std::io::Error> for MemoryError {
    fn from(err: std::io::Error) -> Self {
        MemoryError::Storage(err.to_string())
    }
}

#[derive(Debug, Error)]
pub enum ToolError {
    /// The name did not resolve to a registered tool or alias.
    #[error("tool not found: {name}. Available tools: {}", available.join(", "))]
    NotFound { name: String, available: Vec<String> },

    #[error("Tool execution failed: {tool_name}: {reason}")]
    ExecutionFailed { tool_name: String, reason: String },

    #[error("Tool timed out: {tool_name} after {timeout_secs}s")]
    Timeout { tool_name: String, timeout_secs: u64 },

    #[error("Permission denied: {tool_name}: {reason}")]
    PermissionDenied { tool_name: String, reason: String },

    #[error("Invalid tool arguments: {0}")]
    InvalidArguments(String),

    #[error("tool execution cancelled")]
    Cancelled,
}
