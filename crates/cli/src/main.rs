//! DomiClaw CLI, the main entry point.
//!
//! Commands:
//! - `init`    Create the config file and seed the workspace
//! - `run`     Run the agent on a single prompt
//! - `chat`    Interactive conversation
//! - `resume`  Continue after a context overflow
//! - `status`  Show configuration and recovery state

use std::process::ExitCode;

use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser, Debug)]
#[command(
    name = "domiclaw",
    about = "DomiClaw, an AI coding assistant with persistent memory",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand, Debug, PartialEq)]
enum Commands {
    /// Initialize configuration and workspace
    Init,

    /// Run the agent with a single prompt
    Run {
        /// The prompt to run
        #[arg(short, long)]
        message: String,

        /// Override the configured workspace
        #[arg(short, long)]
        workspace: Option<String>,
    },

    /// Interactive chat mode
    Chat {
        /// Override the configured workspace
        #[arg(short, long)]
        workspace: Option<String>,
    },

    /// Resume the last session after a context overflow
    Resume {
        /// Override the configured workspace
        #[arg(short, long)]
        workspace: Option<String>,
    },

    /// Show current status
    Status,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter)),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let result = match cli.command {
        Commands::Init => commands::init::run().await,
        Commands::Run { message, workspace } => commands::run::run(message, workspace).await,
        Commands::Chat { workspace } => commands::chat::run(workspace).await,
        Commands::Resume { workspace } => commands::resume::run(workspace).await,
        Commands::Status => commands::status::run().await,
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            let code = commands::exit_code(e.as_ref());
            match code {
                0 => eprintln!("Stopped."),
                130 => eprintln!("Interrupted."),
                _ => eprintln!("Error: {e}"),
            }
            ExitCode::from(code)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn run_takes_message_and_workspace() {
        let cli = Cli::try_parse_from(["domiclaw", "run", "-m", "fix the build", "-w", "/tmp/proj"])
            .unwrap();
        assert_eq!(
            cli.command,
            Commands::Run {
                message: "fix the build".into(),
                workspace: Some("/tmp/proj".into()),
            }
        );
        assert!(!cli.verbose);
    }

    #[test]
    fn run_requires_message() {
        assert!(Cli::try_parse_from(["domiclaw", "run"]).is_err());
    }

    #[test]
    fn verbose_is_global() {
        let cli = Cli::try_parse_from(["domiclaw", "chat", "--verbose"]).unwrap();
        assert!(cli.verbose);
        assert_eq!(cli.command, Commands::Chat { workspace: None });
    }

    #[test]
    fn unknown_command_rejected() {
        assert!(Cli::try_parse_from(["domiclaw", "daemon"]).is_err());
    }
}
