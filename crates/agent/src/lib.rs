//! The agent turn loop, the heart of DomiClaw.
//!
//! Each run follows an **ask → act → observe** cycle:
//!
//! 1. **Frame** the transcript (system prompt, memory context, user prompt)
//! 2. **Call the model** through the configured provider, retrying on rate limits
//! 3. **If tool calls**: execute them in order, append results, loop back to step 2
//! 4. **If text only**: record the answer and return
//!
//! The loop ends on a tool-free answer, the iteration cap, cancellation, or a
//! context overflow. Overflow writes recovery state so a later `resume` can
//! pick the work up in a fresh run.

pub mod classify;
pub mod loop_runner;
pub mod prompts;
pub mod recovery;

#[cfg(test)]
mod test_helpers;

pub use classify::{ErrorClass, classify};
pub use loop_runner::{AgentLoop, EventHandler};
pub use recovery::DEFAULT_RESUME_PROMPT;
