//! Subcommands and the wiring they share.

pub mod chat;
pub mod init;
pub mod resume;
pub mod run;
pub mod status;

use std::io::Write;
use std::sync::Arc;

use domiclaw_agent::AgentLoop;
use domiclaw_config::AppConfig;
use domiclaw_core::error::Error;
use domiclaw_core::provider::StreamEvent;
use domiclaw_core::{CancellationToken, RunOutcome, RunStatus};
use tokio::task::JoinHandle;
use tracing::{info, warn};

pub type CliResult<T = ()> = Result<T, Box<dyn std::error::Error>>;

/// Load config and apply a `--workspace` override.
pub fn load_config(workspace: Option<String>) -> CliResult<AppConfig> {
    let mut config = AppConfig::load().map_err(|e| format!("Failed to load config: {e}"))?;
    if let Some(workspace) = workspace {
        config.workspace = workspace;
    }
    Ok(config)
}

/// Build an agent that echoes streamed text to stdout.
pub fn build_agent(config: &AppConfig) -> CliResult<Arc<AgentLoop>> {
    if !config.has_api_key() {
        eprintln!();
        eprintln!("  No API key configured. Set one of:");
        eprintln!("    export ANTHROPIC_API_KEY=\"sk-ant-...\"");
        eprintln!("    export OPENROUTER_API_KEY=\"sk-or-...\"");
        eprintln!("    export OPENAI_COMPAT_API_KEY=\"...\" OPENAI_COMPAT_BASE_URL=\"https://...\"");
        eprintln!("  or add it to {}", AppConfig::config_path().display());
        eprintln!();
    }
    let agent = AgentLoop::from_config(config)?;
    Ok(Arc::new(agent.with_event_handler(Arc::new(echo_text))))
}

fn echo_text(event: &StreamEvent) {
    if let StreamEvent::Text { text } = event {
        let mut out = std::io::stdout().lock();
        // A closed stdout must not abort the run.
        let _ = out.write_all(text.as_bytes());
        let _ = out.flush();
    }
}

/// First Ctrl+C requests a graceful stop; a second one cancels.
///
/// Abort the returned handle once the run is over.
pub fn watch_interrupts(agent: Arc<AgentLoop>, cancel: CancellationToken) -> JoinHandle<()> {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_err() {
            return;
        }
        info!("Interrupt received; stopping after the current step (Ctrl+C again to cancel)");
        agent.stop();

        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Second interrupt; cancelling");
            cancel.cancel();
        }
    })
}

/// Summarize a finished run on stderr.
pub fn report(outcome: &RunOutcome) {
    if outcome.status == RunStatus::IterationLimit {
        eprintln!(
            "[stopped after {} iterations without a final answer]",
            outcome.iterations
        );
    }
    info!(
        iterations = outcome.iterations,
        prompt_tokens = outcome.usage.prompt_tokens,
        completion_tokens = outcome.usage.completion_tokens,
        "Run finished"
    );
}

/// 130 for cancellation, 0 for a graceful stop, 1 for anything else.
pub fn exit_code(err: &(dyn std::error::Error + 'static)) -> u8 {
    match err.downcast_ref::<Error>() {
        Some(Error::Cancelled) => 130,
        Some(Error::Stopped) => 0,
        _ => 1,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use domiclaw_core::error::ProviderError;

    fn code_for(err: impl Into<Box<dyn std::error::Error>>) -> u8 {
        let boxed: Box<dyn std::error::Error> = err.into();
        exit_code(boxed.as_ref())
    }

    #[test]
    fn exit_codes() {
        assert_eq!(code_for(Error::Cancelled), 130);
        assert_eq!(code_for(Error::Stopped), 0);
        assert_eq!(
            code_for(Error::ContextOverflow {
                session_id: "session_1".into()
            }),
            1
        );
        assert_eq!(code_for(Error::Provider(ProviderError::Network("down".into()))), 1);
        assert_eq!(code_for("Failed to load config"), 1);
    }
}
