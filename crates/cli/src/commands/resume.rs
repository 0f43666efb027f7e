//! `domiclaw resume`: continue from the recovery prompt left by a context overflow.

use domiclaw_core::CancellationToken;
use domiclaw_core::memory::MemoryStore;
use domiclaw_memory::FileMemory;

use super::{CliResult, build_agent, load_config, report, watch_interrupts};

pub async fn run(workspace: Option<String>) -> CliResult {
    let config = load_config(workspace)?;

    let memory = FileMemory::new(config.workspace_path());
    if !memory.has_pending_resume().await {
        println!("No pending session to resume.");
        return Ok(());
    }
    if memory.read_resume_prompt().await?.trim().is_empty() {
        println!("Resume trigger found but no resume prompt. Using the default prompt.");
    }

    let agent = build_agent(&config)?;
    println!("Resuming session...");

    let cancel = CancellationToken::new();
    let interrupts = watch_interrupts(agent.clone(), cancel.clone());
    let result = agent.resume(&cancel).await;
    interrupts.abort();
    println!();

    match result? {
        Some(outcome) => report(&outcome),
        None => println!("No pending session to resume."),
    }
    Ok(())
}
