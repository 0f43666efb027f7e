//! # DomiClaw Core
//!
//! Domain types, traits, and error definitions for the DomiClaw autonomous
//! agent. This crate has **no I/O of its own**; it defines the domain model
//! that all other crates implement against.
//!
//! ## Design Philosophy
//!
//! Every collaborator of the agent loop is defined as a trait here. Implementations
//! live in their respective crates. This enables:
//! - Swapping providers, tools and memory backends via configuration
//! - Easy testing with scripted/recording implementations
//! - Clean dependency graph (all crates depend inward on core)

pub mod error;
pub mod message;
pub mod provider;
pub mod tool;
pub mod memory;
pub mod agent;

// Re-export key types at crate root for ergonomics
pub use error::{Error, MemoryError, ProviderError, Result, ToolError};
pub use message::{Message, Role, ToolCall, Transcript};
pub use provider::{EventSink, Provider, ProviderRequest, ProviderResponse, StreamEvent, ToolDefinition, Usage};
pub use tool::{Tool, ToolContext, ToolRegistry};
pub use memory::{MemoryStore, ResumeTrigger};
pub use agent::{LoopConfig, RunOutcome, RunStatus};

pub use tokio_util::sync::CancellationToken;
