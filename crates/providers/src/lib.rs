//! LLM Provider implementations for DomiClaw.
//!
//! All providers implement the `domiclaw_core::Provider` trait.
//! `build_from_config` selects the correct provider based on configuration.

pub mod anthropic;
pub mod openai_compat;
pub mod router;
pub mod sse;

pub use anthropic::AnthropicProvider;
pub use openai_compat::OpenAiCompatProvider;
pub use router::{ProviderKind, build_from_config, select_kind};
pub use sse::{AnthropicStreamDecoder, LineBuffer};
