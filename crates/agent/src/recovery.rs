//! Context-overflow recovery.
//!
//! On overflow the loop persists a resume trigger, a gap-analysis prompt and a
//! daily note, then fails the run with [`Error::ContextOverflow`]. Nothing is
//! retried in-process; a later `resume` starts a fresh run from the prompt.

use chrono::{Local, Utc};
use domiclaw_core::error::Error;
use domiclaw_core::memory::MemoryStore;
use tracing::{info, warn};

use crate::prompts::gap_analysis_prompt;

/// Prompt used when a trigger exists but no recovery prompt was written.
pub const DEFAULT_RESUME_PROMPT: &str =
    "Resume previous session. Check MEMORY.md and daily notes for context.";

pub const OVERFLOW_REASON: &str = "context_overflow";

/// `session_<unix seconds>`
pub fn new_session_id() -> String {
    format!("session_{}", Utc::now().timestamp())
}

/// Write recovery state and build the error that ends the run.
///
/// Storage failures are logged, never raised: the caller still learns about
/// the overflow.
pub async fn handle_overflow(memory: &dyn MemoryStore, daily_notes_days: u32) -> Error {
    warn!("Context overflow detected, initiating recovery");

    let session_id = new_session_id();

    if let Err(e) = memory.write_resume_trigger(&session_id, OVERFLOW_REASON).await {
        warn!(error = %e, "Failed to write resume trigger");
    }

    let context = memory.get_context(daily_notes_days).await.unwrap_or_else(|e| {
        warn!(error = %e, "Failed to load memory context for recovery prompt");
        String::new()
    });
    if let Err(e) = memory.write_resume_prompt(&gap_analysis_prompt(&context)).await {
        warn!(error = %e, "Failed to write resume prompt");
    }

    let note = format!(
        "## Context Overflow Recovery\n\n\
         Time: {}\n\
         Session: {session_id}\n\n\
         Context overflow detected. Resume trigger created.\n\
         Run 'domiclaw resume' to continue.\n",
        Local::now().format("%H:%M:%S")
    );
    if let Err(e) = memory.append_daily_note(&note).await {
        warn!(error = %e, "Failed to append overflow note");
    }

    info!(session_id = %session_id, "Recovery state written");
    Error::ContextOverflow { session_id }
}

/// Take the pending recovery prompt, clearing the trigger.
///
/// Returns `None` when nothing is pending.
pub async fn take_resume_prompt(memory: &dyn MemoryStore) -> Option<String> {
    if !memory.has_pending_resume().await {
        return None;
    }

    match memory.read_resume_trigger().await {
        Ok(Some(trigger)) => info!(
            session_id = %trigger.session_id,
            reason = %trigger.reason,
            "Resuming session"
        ),
        Ok(None) => {}
        Err(e) => warn!(error = %e, "Resume trigger unreadable; resuming anyway"),
    }

    let prompt = match memory.read_resume_prompt().await {
        Ok(p) if !p.trim().is_empty() => p,
        Ok(_) => DEFAULT_RESUME_PROMPT.to_string(),
        Err(e) => {
            warn!(error = %e, "Failed to read resume prompt");
            DEFAULT_RESUME_PROMPT.to_string()
        }
    };

    if let Err(e) = memory.clear_resume_trigger().await {
        warn!(error = %e, "Failed to clear resume trigger");
    }
    Some(prompt)
}

#[cfg(test)]
mod tests {
    use super::*;
    use domiclaw_memory::InMemoryStore;

    #[test]
    fn session_id_format() {
        let id = new_session_id();
        let secs = id.strip_prefix("session_").unwrap();
        assert!(secs.parse::<i64>().unwrap() > 1_600_000_000);
    }

    #[tokio::test]
    async fn overflow_writes_trigger_prompt_and_note() {
        let mem = InMemoryStore::new();
        mem.set_long_term("project: parser rewrite").await;

        let err = handle_overflow(&mem, 3).await;
        let Error::ContextOverflow { session_id } = &err else {
            panic!("expected overflow, got {err:?}");
        };
        assert!(err.to_string().contains("run 'domiclaw resume' to continue"));

        let trigger = mem.trigger().await.unwrap();
        assert_eq!(&trigger.session_id, session_id);
        assert_eq!(trigger.reason, "context_overflow");

        let prompt = mem.read_resume_prompt().await.unwrap();
        assert!(prompt.contains("Gap Analysis"));
        assert!(prompt.contains("project: parser rewrite"));

        let notes = mem.notes().await;
        assert_eq!(notes.len(), 1);
        assert!(notes[0].starts_with("## Context Overflow Recovery"));
        assert!(notes[0].contains(session_id.as_str()));
    }

    #[tokio::test]
    async fn take_prompt_clears_trigger() {
        let mem = InMemoryStore::new();
        assert!(take_resume_prompt(&mem).await.is_none());

        mem.write_resume_trigger("session_1", OVERFLOW_REASON).await.unwrap();
        assert_eq!(take_resume_prompt(&mem).await.unwrap(), DEFAULT_RESUME_PROMPT);
        assert!(!mem.has_pending_resume().await);

        mem.write_resume_trigger("session_2", OVERFLOW_REASON).await.unwrap();
        mem.write_resume_prompt("pick up the refactor").await.unwrap();
        assert_eq!(take_resume_prompt(&mem).await.unwrap(), "pick up the refactor");
    }
}
