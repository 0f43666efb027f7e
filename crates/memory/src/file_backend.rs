//! File-based memory store: plain Markdown files inside the workspace.
//!
//! Layout:
//!
//! ```text
//! <workspace>/
//! ├── MEMORY.md              long-term memory
//! ├── resume-prompt.md       recovery prompt for the next run
//! ├── resume-trigger.json    pending-resume marker
//! └── memory/
//!     └── YYYYMM/
//!         └── YYYYMMDD.md    daily notes
//! ```
//!
//! Everything is human-editable; the agent and the operator share the files.

use async_trait::async_trait;
use chrono::{DateTime, Days, Local, NaiveDate, Utc};
use domiclaw_core::error::MemoryError;
use domiclaw_core::memory::{MemoryStore, ResumeTrigger};
use std::path::{Path, PathBuf};
use tokio::sync::Mutex;
use tracing::{debug, warn};

const LONG_TERM_FILE: &str = "MEMORY.md";
const RESUME_PROMPT_FILE: &str = "resume-prompt.md";
const RESUME_TRIGGER_FILE: &str = "resume-trigger.json";
const NOTES_DIR: &str = "memory";

/// A memory store backed by files in the agent workspace.
pub struct FileMemory {
    workspace: PathBuf,
    /// Serializes read-modify-write cycles on the daily note.
    write_lock: Mutex<()>,
}

impl FileMemory {
    /// Create a store rooted at `workspace`. Directories are created lazily.
    pub fn new(workspace: impl Into<PathBuf>) -> Self {
        Self {
            workspace: workspace.into(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn workspace(&self) -> &Path {
        &self.workspace
    }

    pub fn long_term_path(&self) -> PathBuf {
        self.workspace.join(LONG_TERM_FILE)
    }

    pub fn resume_prompt_path(&self) -> PathBuf {
        self.workspace.join(RESUME_PROMPT_FILE)
    }

    pub fn resume_trigger_path(&self) -> PathBuf {
        self.workspace.join(RESUME_TRIGGER_FILE)
    }

    /// `memory/YYYYMM/YYYYMMDD.md` for the given day.
    pub fn daily_note_path(&self, date: NaiveDate) -> PathBuf {
        self.workspace
            .join(NOTES_DIR)
            .join(date.format("%Y%m").to_string())
            .join(format!("{}.md", date.format("%Y%m%d")))
    }

    /// Contents of MEMORY.md, empty if absent.
    pub async fn read_long_term(&self) -> Result<String, MemoryError> {
        read_or_empty(&self.long_term_path()).await
    }

    /// Replace MEMORY.md.
    pub async fn write_long_term(&self, content: &str) -> Result<(), MemoryError> {
        write_file(&self.long_term_path(), content).await
    }

    /// The note for one day, empty if absent.
    pub async fn read_daily_note(&self, date: NaiveDate) -> Result<String, MemoryError> {
        read_or_empty(&self.daily_note_path(date)).await
    }

    /// Append to the note for `now`'s day, starting a fresh file with a
    /// `# YYYY-MM-DD Weekday` header.
    pub async fn append_note_at(&self, now: DateTime<Local>, text: &str) -> Result<(), MemoryError> {
        let _guard = self.write_lock.lock().await;
        let path = self.daily_note_path(now.date_naive());
        let existing = read_or_empty(&path).await?;

        let content = if existing.is_empty() {
            format!("# {}\n\n{text}", now.format("%Y-%m-%d %A"))
        } else if existing.ends_with('\n') {
            format!("{existing}\n{text}")
        } else {
            format!("{existing}\n\n{text}")
        };
        write_file(&path, &content).await
    }

    /// Memory context as of `today`: long-term memory plus the last `days`
    /// daily notes, newest first.
    pub async fn context_as_of(&self, today: NaiveDate, days: u32) -> Result<String, MemoryError> {
        let mut parts = Vec::new();

        let long_term = self.read_long_term().await?;
        if !long_term.is_empty() {
            parts.push(format!("## Long-term Memory\n\n{long_term}"));
        }

        let mut notes = Vec::new();
        for offset in 0..days {
            let Some(date) = today.checked_sub_days(Days::new(u64::from(offset))) else {
                break;
            };
            let note = self.read_daily_note(date).await?;
            if !note.is_empty() {
                notes.push(note);
            }
        }
        if !notes.is_empty() {
            parts.push(format!("## Recent Daily Notes\n\n{}", notes.join("\n\n---\n\n")));
        }

        if parts.is_empty() {
            return Ok(String::new());
        }
        Ok(format!("# Memory\n\n{}", parts.join("\n\n---\n\n")))
    }
}

async fn read_or_empty(path: &Path) -> Result<String, MemoryError> {
    match tokio::fs::read_to_string(path).await {
        Ok(content) => Ok(content),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(String::new()),
        Err(e) => Err(MemoryError::Storage(format!(
            "Failed to read {}: {e}",
            path.display()
        ))),
    }
}

async fn write_file(path: &Path, content: &str) -> Result<(), MemoryError> {
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await.map_err(|e| {
            MemoryError::Storage(format!("Failed to create {}: {e}", parent.display()))
        })?;
    }
    tokio::fs::write(path, content)
        .await
        .map_err(|e| MemoryError::Storage(format!("Failed to write {}: {e}", path.display())))
}

async fn remove_if_exists(path: &Path) -> Result<(), MemoryError> {
    match tokio::fs::remove_file(path).await {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(MemoryError::Storage(format!(
            "Failed to remove {}: {e}",
            path.display()
        ))),
    }
}

#[async_trait]
impl MemoryStore for FileMemory {
    fn name(&self) -> &str {
        "file"
    }

    async fn get_context(&self, days: u32) -> Result<String, MemoryError> {
        self.context_as_of(Local::now().date_naive(), days).await
    }

    async fn has_pending_resume(&self) -> bool {
        tokio::fs::try_exists(self.resume_trigger_path())
            .await
            .unwrap_or(false)
    }

    async fn read_resume_trigger(&self) -> Result<Option<ResumeTrigger>, MemoryError> {
        let raw = read_or_empty(&self.resume_trigger_path()).await?;
        if raw.trim().is_empty() {
            return Ok(None);
        }
        match serde_json::from_str(&raw) {
            Ok(trigger) => Ok(Some(trigger)),
            Err(e) => {
                warn!(error = %e, "Resume trigger is not valid JSON");
                Err(MemoryError::Serialization(e.to_string()))
            }
        }
    }

    async fn read_resume_prompt(&self) -> Result<String, MemoryError> {
        read_or_empty(&self.resume_prompt_path()).await
    }

    async fn write_resume_trigger(&self, session_id: &str, reason: &str) -> Result<(), MemoryError> {
        let trigger = ResumeTrigger {
            timestamp: Utc::now(),
            session_id: session_id.to_string(),
            reason: reason.to_string(),
            workspace: self.workspace.display().to_string(),
        };
        let mut json = serde_json::to_string_pretty(&trigger)
            .map_err(|e| MemoryError::Serialization(e.to_string()))?;
        json.push('\n');
        debug!(session_id, reason, "Writing resume trigger");
        write_file(&self.resume_trigger_path(), &json).await
    }

    async fn write_resume_prompt(&self, prompt: &str) -> Result<(), MemoryError> {
        write_file(&self.resume_prompt_path(), prompt).await
    }

    async fn clear_resume_trigger(&self) -> Result<(), MemoryError> {
        remove_if_exists(&self.resume_trigger_path()).await?;
        remove_if_exists(&self.resume_prompt_path()).await
    }

    async fn append_daily_note(&self, text: &str) -> Result<(), MemoryError> {
        self.append_note_at(Local::now(), text).await
    }
}
