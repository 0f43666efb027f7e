//! In-memory store: useful for testing and ephemeral sessions.

use async_trait::async_trait;
use chrono::Utc;
use domiclaw_core::error::MemoryError;
use domiclaw_core::memory::{MemoryStore, ResumeTrigger};
use std::sync::Arc;
use tokio::sync::RwLock;

#[derive(Default)]
struct State {
    long_term: String,
    notes: Vec<String>,
    trigger: Option<ResumeTrigger>,
    prompt: String,
}

/// A memory store that keeps everything in process.
///
/// Notes are kept as a flat list of appended entries; there is no
/// per-day bucketing.
pub struct InMemoryStore {
    workspace: String,
    state: Arc<RwLock<State>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::with_workspace("")
    }

    /// Workspace name recorded in resume triggers.
    pub fn with_workspace(workspace: impl Into<String>) -> Self {
        Self {
            workspace: workspace.into(),
            state: Arc::new(RwLock::new(State::default())),
        }
    }

    pub async fn set_long_term(&self, content: impl Into<String>) {
        self.state.write().await.long_term = content.into();
    }

    /// Every appended daily-note entry, oldest first.
    pub async fn notes(&self) -> Vec<String> {
        self.state.read().await.notes.clone()
    }

    pub async fn trigger(&self) -> Option<ResumeTrigger> {
        self.state.read().await.trigger.clone()
    }
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl MemoryStore for InMemoryStore {
    fn name(&self) -> &str { "in_memory" }

    async fn get_context(&self, days: u32) -> Result<String, MemoryError> {
        let state = self.state.read().await;
        let mut parts = Vec::new();
        if !state.long_term.is_empty() {
            parts.push(format!("## Long-term Memory\n\n{}", state.long_term));
        }
        if days > 0 && !state.notes.is_empty() {
            parts.push(format!("## Recent Daily Notes\n\n{}", state.notes.join("\n")));
        }
        if parts.is_empty() {
            return Ok(String::new());
        }
        Ok(format!("# Memory\n\n{}", parts.join("\n\n---\n\n")))
    }

    async fn has_pending_resume(&self) -> bool {
        self.state.read().await.trigger.is_some()
    }

    async fn read_resume_trigger(&self) -> Result<Option<ResumeTrigger>, MemoryError> {
        Ok(self.state.read().await.trigger.clone())
    }

    async fn read_resume_prompt(&self) -> Result<String, MemoryError> {
        Ok(self.state.read().await.prompt.clone())
    }

    async fn write_resume_trigger(&self, session_id: &str, reason: &str) -> Result<(), MemoryError> {
        self.state.write().await.trigger = Some(ResumeTrigger {
            timestamp: Utc::now(),
            session_id: session_id.to_string(),
            reason: reason.to_string(),
            workspace: self.workspace.clone(),
        });
        Ok(())
    }

    async fn write_resume_prompt(&self, prompt: &str) -> Result<(), MemoryError> {
        self.state.write().await.prompt = prompt.to_string();
        Ok(())
    }

    async fn clear_resume_trigger(&self) -> Result<(), MemoryError> {
        let mut state = self.state.write().await;
        state.trigger = None;
        state.prompt.clear();
        Ok(())
    }

    async fn append_daily_note(&self, text: &str) -> Result<(), MemoryError> {
        self.state.write().await.notes.push(text.to_string());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn empty_store_has_no_context() {
        let mem = InMemoryStore::new();
        assert_eq!(mem.get_context(3).await.unwrap(), "");
        assert!(!mem.has_pending_resume().await);
    }

    #[tokio::test]
    async fn context_includes_long_term_and_notes() {
        let mem = InMemoryStore::new();
        mem.set_long_term("prefers tabs").await;
        mem.append_daily_note("## Strategic Boundary: Checkpoint\n").await.unwrap();

        let ctx = mem.get_context(3).await.unwrap();
        assert!(ctx.starts_with("# Memory\n\n## Long-term Memory\n\nprefers tabs"));
        assert!(ctx.contains("Strategic Boundary: Checkpoint"));
        assert_eq!(mem.notes().await.len(), 1);
    }

    #[tokio::test]
    async fn trigger_round_trip_and_clear() {
        let mem = InMemoryStore::with_workspace("/ws");
        mem.write_resume_trigger("session_9", "context_overflow").await.unwrap();
        mem.write_resume_prompt("recover").await.unwrap();

        assert!(mem.has_pending_resume().await);
        let trigger = mem.read_resume_trigger().await.unwrap().unwrap();
        assert_eq!(trigger.session_id, "session_9");
        assert_eq!(trigger.workspace, "/ws");

        mem.clear_resume_trigger().await.unwrap();
        assert!(!mem.has_pending_resume().await);
        assert_eq!(mem.read_resume_prompt().await.unwrap(), "");
    }
}
