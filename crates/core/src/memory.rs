//! Memory trait: the notes and recovery collaborator consumed by the loop.
//!
//! The loop never interprets storage formats. It only asks for context text,
//! appends daily notes, and manages the resume trigger through this trait.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::MemoryError;

/// Record signalling that a previous run ended in overflow and a follow-up
/// run should resume from a generated recovery prompt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResumeTrigger {
    /// When the trigger was written
    pub timestamp: DateTime<Utc>,

    /// Session that overflowed
    pub session_id: String,

    /// Why the session ended (e.g. "context_overflow")
    pub reason: String,

    /// Workspace the session was operating in
    #[serde(default)]
    pub workspace: String,
}

/// Persistent notes storage plus resume-trigger bookkeeping.
#[async_trait]
pub trait MemoryStore: Send + Sync {
    /// A human-readable name for this backend.
    fn name(&self) -> &str;

    /// Long-term memory plus the last `days` of daily notes, as one text.
    /// Empty when there is nothing stored.
    async fn get_context(&self, days: u32) -> std::result::Result<String, MemoryError>;

    /// Whether a resume trigger is waiting.
    async fn has_pending_resume(&self) -> bool;

    /// The pending trigger record, if any.
    async fn read_resume_trigger(&self) -> std::result::Result<Option<ResumeTrigger>, MemoryError>;

    /// The stored recovery prompt; empty when none has been written.
    async fn read_resume_prompt(&self) -> std::result::Result<String, MemoryError>;

    /// Persist a resume trigger for `session_id`.
    async fn write_resume_trigger(&self, session_id: &str, reason: &str) -> std::result::Result<(), MemoryError>;

    /// Persist the prompt a resumed run should start with.
    async fn write_resume_prompt(&self, prompt: &str) -> std::result::Result<(), MemoryError>;

    /// Remove the trigger (and its prompt).
    async fn clear_resume_trigger(&self) -> std::result::Result<(), MemoryError>;

    /// Append `text` to today's note.
    async fn append_daily_note(&self, text: &str) -> std::result::Result<(), MemoryError>;
}
