//! The agent turn loop implementation.

use std::path::PathBuf;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use chrono::Local;
use domiclaw_config::AppConfig;
use domiclaw_core::agent::{LoopConfig, RunOutcome, RunStatus};
use domiclaw_core::error::{Error, ProviderError, Result};
use domiclaw_core::memory::MemoryStore;
use domiclaw_core::message::{Message, ToolCall, Transcript};
use domiclaw_core::provider::{Provider, ProviderRequest, ProviderResponse, StreamEvent, Usage};
use domiclaw_core::tool::{ToolContext, ToolRegistry};
use domiclaw_core::CancellationToken;
use domiclaw_memory::FileMemory;
use tracing::{debug, info, warn};

use crate::classify::{ErrorClass, classify};
use crate::prompts::{LOOP_BREAKER_MESSAGE, system_prompt};
use crate::recovery;

/// Tool results longer than this many bytes are cut before entering the transcript.
pub const MAX_TOOL_RESULT_BYTES: usize = 32 * 1024;

/// Consecutive repeats of the same first tool call that trigger the loop-breaker.
const REPEAT_THRESHOLD: u32 = 2;

/// Observer for decoded stream events (e.g. echoing text to a terminal).
///
/// Called on the task reading the response body; it must not block.
pub type EventHandler = Arc<dyn Fn(&StreamEvent) + Send + Sync>;

/// Transcript plus loop-breaker bookkeeping. Owned by one loop.
#[derive(Default)]
struct LoopState {
    transcript: Transcript,
    last_signature: Option<String>,
    repeat_count: u32,
}

/// Reentrancy flag and the stop signal of the current run.
struct Control {
    running: bool,
    stop: CancellationToken,
}

/// Clears the running flag when a run ends, however it ends.
struct RunGuard<'a> {
    control: &'a Mutex<Control>,
}

impl Drop for RunGuard<'_> {
    fn drop(&mut self) {
        self.control
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .running = false;
    }
}

/// The core agent loop that orchestrates model calls and tool execution.
pub struct AgentLoop {
    /// The LLM provider to use
    provider: Arc<dyn Provider>,

    /// Tool registry, shareable between loops
    tools: Arc<ToolRegistry>,

    /// Notes and recovery collaborator
    memory: Arc<dyn MemoryStore>,

    config: LoopConfig,

    /// Directory tools operate in
    workspace: PathBuf,

    control: Mutex<Control>,

    state: tokio::sync::Mutex<LoopState>,

    on_event: Option<EventHandler>,
}

impl AgentLoop {
    /// Create a new agent loop.
    pub fn new(
        provider: Arc<dyn Provider>,
        tools: Arc<ToolRegistry>,
        memory: Arc<dyn MemoryStore>,
        config: LoopConfig,
        workspace: impl Into<PathBuf>,
    ) -> Self {
        Self {
            provider,
            tools,
            memory,
            config,
            workspace: workspace.into(),
            control: Mutex::new(Control {
                running: false,
                stop: CancellationToken::new(),
            }),
            state: tokio::sync::Mutex::new(LoopState::default()),
            on_event: None,
        }
    }

    /// Wire a loop from application configuration: the configured provider,
    /// the built-in tools, and file memory in the workspace.
    pub fn from_config(config: &AppConfig) -> Result<Self> {
        config.validate().map_err(|e| Error::Config {
            message: e.to_string(),
        })?;
        let provider = domiclaw_providers::build_from_config(config)?;
        let workspace = config.workspace_path();
        let tools = Arc::new(domiclaw_tools::default_registry(&config.tools));
        let memory: Arc<dyn MemoryStore> = Arc::new(FileMemory::new(workspace.clone()));
        Ok(Self::new(provider, tools, memory, config.loop_config(), workspace))
    }

    /// Observe stream events as they are decoded.
    pub fn with_event_handler(mut self, handler: EventHandler) -> Self {
        self.on_event = Some(handler);
        self
    }

    pub fn provider_name(&self) -> &str {
        self.provider.name()
    }

    pub fn is_running(&self) -> bool {
        self.control
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .running
    }

    /// Request a graceful stop. Observed at the next checkpoint.
    pub fn stop(&self) {
        let control = self.control.lock().unwrap_or_else(PoisonError::into_inner);
        if control.running {
            info!("Stop requested");
            control.stop.cancel();
        }
    }

    /// Snapshot of the current transcript.
    pub async fn transcript(&self) -> Vec<Message> {
        self.state.lock().await.transcript.messages().to_vec()
    }

    /// Drop the conversation. The next `run_continue` rebuilds the framing.
    pub async fn clear_history(&self) {
        let mut state = self.state.lock().await;
        *state = LoopState::default();
        debug!("Conversation history cleared");
    }

    /// Run a single task from scratch.
    ///
    /// A pending recovery prompt takes the place of `prompt`. Memory context
    /// is prepended to whichever prompt is used.
    pub async fn run(&self, cancel: &CancellationToken, prompt: &str) -> Result<RunOutcome> {
        let (_guard, stop) = self.begin()?;

        let mut prompt = prompt.to_string();
        if self.memory.has_pending_resume().await {
            info!("Found pending session to resume");
            match self.memory.read_resume_prompt().await {
                Ok(resume) if !resume.is_empty() => {
                    prompt = resume;
                    if let Err(e) = self.memory.clear_resume_trigger().await {
                        warn!(error = %e, "Failed to clear resume trigger");
                    }
                }
                Ok(_) => {}
                Err(e) => warn!(error = %e, "Failed to read resume prompt"),
            }
        }

        self.fresh_run(cancel, &stop, &prompt).await
    }

    /// Continue the conversation with another user message.
    ///
    /// On an empty transcript this frames a new conversation first.
    pub async fn run_continue(&self, cancel: &CancellationToken, input: &str) -> Result<RunOutcome> {
        let (_guard, stop) = self.begin()?;

        let mut state = self.state.lock().await;
        if state.transcript.is_empty() {
            self.frame(&mut state, input).await;
        } else {
            state.transcript.push(Message::user(input));
        }
        self.drive(&mut state, cancel, &stop).await
    }

    /// Resume after a context overflow.
    ///
    /// Returns `Ok(None)` when no resume trigger is pending.
    /// The recovery state is only consumed once this loop holds the run guard.
    pub async fn resume(&self, cancel: &CancellationToken) -> Result<Option<RunOutcome>> {
        let (_guard, stop) = self.begin()?;
        let Some(prompt) = recovery::take_resume_prompt(self.memory.as_ref()).await else {
            return Ok(None);
        };
        self.fresh_run(cancel, &stop, &prompt).await.map(Some)
    }

    /// Reset the transcript, frame `prompt` and drive it. Caller holds the guard.
    async fn fresh_run(
        &self,
        cancel: &CancellationToken,
        stop: &CancellationToken,
        prompt: &str,
    ) -> Result<RunOutcome> {
        let mut state = self.state.lock().await;
        *state = LoopState::default();
        self.frame(&mut state, prompt).await;
        self.drive(&mut state, cancel, stop).await
    }

    fn begin(&self) -> Result<(RunGuard<'_>, CancellationToken)> {
        let mut control = self.control.lock().unwrap_or_else(PoisonError::into_inner);
        if control.running {
            return Err(Error::AlreadyRunning);
        }
        control.running = true;
        control.stop = CancellationToken::new();
        let stop = control.stop.clone();
        Ok((RunGuard { control: &self.control }, stop))
    }

    /// Push the system prompt and the first user message.
    async fn frame(&self, state: &mut LoopState, prompt: &str) {
        let system = match &self.config.system_prompt {
            Some(custom) => custom.clone(),
            None => system_prompt(&self.workspace, &self.tools.list()),
        };

        let context = match self.memory.get_context(self.config.daily_notes_days).await {
            Ok(c) => c,
            Err(e) => {
                warn!(error = %e, "Failed to load memory context");
                String::new()
            }
        };
        let user = if context.is_empty() {
            prompt.to_string()
        } else {
            format!("{context}\n\n---\n\n{prompt}")
        };

        state.transcript.push(Message::system(system));
        state.transcript.push(Message::user(user));
    }

    async fn drive(
        &self,
        state: &mut LoopState,
        cancel: &CancellationToken,
        stop: &CancellationToken,
    ) -> Result<RunOutcome> {
        let definitions = self.tools.definitions();
        let ctx = ToolContext::new(self.workspace.clone(), cancel.clone());
        let mut usage = Usage::default();
        let mut iterations = 0;

        state.last_signature = None;
        state.repeat_count = 0;

        while iterations < self.config.max_tool_iterations {
            checkpoint(cancel, stop)?;
            iterations += 1;

            debug!(
                iteration = iterations,
                messages = state.transcript.len(),
                "Agent loop iteration"
            );

            let mut request =
                ProviderRequest::new(self.config.model.clone(), state.transcript.messages().to_vec())
                    .with_tools(definitions.clone());
            request.max_tokens = Some(self.config.max_tokens);
            request.temperature = Some(self.config.temperature);

            let response = self.call_model(&request, cancel, stop).await?;
            usage += response.usage;

            if !response.has_tool_calls() {
                if !response.content.is_empty() {
                    state.transcript.push(Message::assistant(response.content.clone()));
                }
                self.scan_boundaries(&response.content).await;
                info!(iterations, total_tokens = usage.total_tokens, "Run completed");
                return Ok(RunOutcome {
                    text: response.content,
                    iterations,
                    usage,
                    status: RunStatus::Completed,
                });
            }

            let calls: Vec<ToolCall> = response
                .tool_calls
                .into_iter()
                .map(|mut call| {
                    call.name = self.tools.resolve_name(&call.name);
                    call
                })
                .collect();

            debug!(tool_count = calls.len(), "Executing tool calls");
            state
                .transcript
                .push(Message::assistant_with_tools(response.content.clone(), calls.clone()));

            // Sequential: later calls may depend on earlier side effects.
            for call in &calls {
                let result = match self.tools.execute(&ctx, &call.name, &call.arguments).await {
                    Ok(output) => output,
                    Err(e) => {
                        warn!(tool = %call.name, error = %e, "Tool execution failed");
                        format!("Error: {e}")
                    }
                };
                state
                    .transcript
                    .push(Message::tool_result(call.id.clone(), truncate_result(result)));
            }

            if let Some(first) = calls.first() {
                self.check_repetition(state, first);
            }

            self.scan_boundaries(&response.content).await;
        }

        warn!(
            max_iterations = self.config.max_tool_iterations,
            "Max tool iterations reached"
        );
        Ok(RunOutcome {
            text: String::new(),
            iterations,
            usage,
            status: RunStatus::IterationLimit,
        })
    }

    /// One model call with rate-limit retry and overflow detection.
    async fn call_model(
        &self,
        request: &ProviderRequest,
        cancel: &CancellationToken,
        stop: &CancellationToken,
    ) -> Result<ProviderResponse> {
        let mut attempt: u32 = 0;
        loop {
            attempt += 1;

            let handler = self.on_event.as_ref();
            let mut sink = |event: StreamEvent| {
                if let Some(h) = handler {
                    h(&event);
                }
            };
            let err = match self.provider.chat_stream(request, cancel, &mut sink).await {
                Ok(response) => return Ok(response),
                Err(e) => e,
            };

            if matches!(err, ProviderError::Cancelled) {
                return Err(Error::Cancelled);
            }

            match classify(&err, &self.config) {
                ErrorClass::ContextOverflow => {
                    warn!(error = %err, "Context overflow");
                    return Err(
                        recovery::handle_overflow(self.memory.as_ref(), self.config.daily_notes_days)
                            .await,
                    );
                }
                ErrorClass::RateLimited if attempt < self.config.retry_attempts => {
                    let delay = Duration::from_millis(self.config.retry_backoff_ms * u64::from(attempt));
                    warn!(
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        error = %err,
                        "Rate limited; backing off"
                    );
                    backoff(delay, cancel, stop).await?;
                }
                _ => return Err(err.into()),
            }
        }
    }

    fn check_repetition(&self, state: &mut LoopState, first: &ToolCall) {
        let signature = format!(
            "{}:{}",
            first.name,
            serde_json::Value::Object(first.arguments.clone())
        );

        if state.last_signature.as_deref() == Some(signature.as_str()) {
            state.repeat_count += 1;
        } else {
            state.last_signature = Some(signature);
            state.repeat_count = 0;
        }

        if state.repeat_count >= REPEAT_THRESHOLD {
            warn!(tool = %first.name, "Repeated tool call detected; injecting correction");
            state.transcript.push(Message::user(LOOP_BREAKER_MESSAGE));
            state.last_signature = None;
            state.repeat_count = 0;
        }
    }

    /// Log the first configured boundary pattern found in `text` to today's note.
    async fn scan_boundaries(&self, text: &str) {
        let Some(pattern) = self
            .config
            .boundary_patterns
            .iter()
            .find(|p| !p.is_empty() && text.contains(p.as_str()))
        else {
            return;
        };

        info!(pattern = %pattern, "Strategic boundary detected");
        let note = format!(
            "## Strategic Boundary: {pattern}\n\nDetected at {}\n",
            Local::now().format("%H:%M:%S")
        );
        if let Err(e) = self.memory.append_daily_note(&note).await {
            warn!(error = %e, "Failed to record boundary note");
        }
    }
}

/// Cancellation wins over a graceful stop when both have fired.
fn checkpoint(cancel: &CancellationToken, stop: &CancellationToken) -> Result<()> {
    if cancel.is_cancelled() {
        Err(Error::Cancelled)
    } else if stop.is_cancelled() {
        Err(Error::Stopped)
    } else {
        Ok(())
    }
}

async fn backoff(delay: Duration, cancel: &CancellationToken, stop: &CancellationToken) -> Result<()> {
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(Error::Cancelled),
        _ = stop.cancelled() => Err(Error::Stopped),
        _ = tokio::time::sleep(delay) => Ok(()),
    }
}

fn truncate_result(mut text: String) -> String {
    if text.len() <= MAX_TOOL_RESULT_BYTES {
        return text;
    }
    let mut end = MAX_TOOL_RESULT_BYTES;
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    text.truncate(end);
    text.push_str("...");
    text
}
