//! `domiclaw chat`: interactive conversation in the terminal.

use std::io::Write;

use domiclaw_core::CancellationToken;
use domiclaw_core::error::Error;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::warn;

use super::{CliResult, build_agent, load_config, report, status, watch_interrupts};

/// Slash commands understood at the prompt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ChatCommand {
    Quit,
    Clear,
    Status,
}

impl ChatCommand {
    fn parse(input: &str) -> Option<Self> {
        match input.to_lowercase().as_str() {
            "/quit" | "/exit" | "/q" => Some(Self::Quit),
            "/clear" => Some(Self::Clear),
            "/status" => Some(Self::Status),
            _ => None,
        }
    }
}

pub async fn run(workspace: Option<String>) -> CliResult {
    let config = load_config(workspace)?;
    let agent = build_agent(&config)?;
    let cancel = CancellationToken::new();

    println!();
    println!("DomiClaw Interactive Mode");
    println!("==========================");
    println!("Workspace: {}", config.workspace_path().display());
    println!("Provider:  {} ({})", agent.provider_name(), config.agent.model);
    println!("Type your message and press Enter. Commands:");
    println!("  /quit, /exit  - Exit chat");
    println!("  /clear        - Clear conversation history");
    println!("  /status       - Show status");
    println!();

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        print!("You: ");
        std::io::stdout().flush()?;

        // Ctrl+C at the prompt leaves the session.
        let line = tokio::select! {
            line = lines.next_line() => line?,
            _ = tokio::signal::ctrl_c() => {
                println!("\n\nGoodbye!");
                return Ok(());
            }
        };
        let Some(line) = line else {
            println!();
            return Ok(());
        };

        let input = line.trim();
        if input.is_empty() {
            continue;
        }

        match ChatCommand::parse(input) {
            Some(ChatCommand::Quit) => {
                println!("Goodbye!");
                return Ok(());
            }
            Some(ChatCommand::Clear) => {
                agent.clear_history().await;
                println!("[Conversation history cleared]");
                continue;
            }
            Some(ChatCommand::Status) => {
                print!("{}", status::render(&config).await);
                continue;
            }
            None => {}
        }

        print!("\nDomiClaw: ");
        std::io::stdout().flush()?;

        // Ctrl+C during a turn stops that turn; a second one cancels.
        let interrupts = watch_interrupts(agent.clone(), cancel.clone());
        let result = agent.run_continue(&cancel, input).await;
        interrupts.abort();
        println!();

        match result {
            Ok(outcome) => report(&outcome),
            Err(Error::Stopped) => println!("[Stopped]"),
            Err(Error::Cancelled) => {
                println!("\nGoodbye!");
                return Ok(());
            }
            Err(e @ Error::ContextOverflow { .. }) => return Err(e.into()),
            Err(e) => warn!(error = %e, "Agent error"),
        }
        println!();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_slash_commands() {
        assert_eq!(ChatCommand::parse("/quit"), Some(ChatCommand::Quit));
        assert_eq!(ChatCommand::parse("/EXIT"), Some(ChatCommand::Quit));
        assert_eq!(ChatCommand::parse("/q"), Some(ChatCommand::Quit));
        assert_eq!(ChatCommand::parse("/clear"), Some(ChatCommand::Clear));
        assert_eq!(ChatCommand::parse("/status"), Some(ChatCommand::Status));
        assert_eq!(ChatCommand::parse("/help"), None);
        assert_eq!(ChatCommand::parse("quit"), None);
    }
}
