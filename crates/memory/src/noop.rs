//! No-op memory store: disables notes and recovery entirely.

use async_trait::async_trait;
use domiclaw_core::error::MemoryError;
use domiclaw_core::memory::{MemoryStore, ResumeTrigger};

/// A memory store that keeps nothing and never has a pending resume.
pub struct NoopMemory;

#[async_trait]
impl MemoryStore for NoopMemory {
    fn name(&self) -> &str { "none" }

    async fn get_context(&self, _days: u32) -> Result<String, MemoryError> {
        Ok(String::new())
    }

    async fn has_pending_resume(&self) -> bool {
        false
    }

    async fn read_resume_trigger(&self) -> Result<Option<ResumeTrigger>, MemoryError> {
        Ok(None)
    }

    async fn read_resume_prompt(&self) -> Result<String, MemoryError> {
        Ok(String::new())
    }

    async fn write_resume_trigger(&self, _session_id: &str, _reason: &str) -> Result<(), MemoryError> {
        Ok(())
    }

    async fn write_resume_prompt(&self, _prompt: &str) -> Result<(), MemoryError> {
        Ok(())
    }

    async fn clear_resume_trigger(&self) -> Result<(), MemoryError> {
        Ok(())
    }

    async fn append_daily_note(&self, _text: &str) -> Result<(), MemoryError> {
        Ok(())
    }
}
