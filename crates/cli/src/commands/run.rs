//! `domiclaw run`: one prompt, answer streamed to stdout.

use domiclaw_core::CancellationToken;

use super::{CliResult, build_agent, load_config, report, watch_interrupts};

pub async fn run(message: String, workspace: Option<String>) -> CliResult {
    if message.trim().is_empty() {
        return Err("No prompt provided. Use -m \"your prompt\"".into());
    }

    let config = load_config(workspace)?;
    let agent = build_agent(&config)?;
    let cancel = CancellationToken::new();
    let interrupts = watch_interrupts(agent.clone(), cancel.clone());

    let result = agent.run(&cancel, &message).await;
    interrupts.abort();
    println!();

    let outcome = result?;
    report(&outcome);
    Ok(())
}
