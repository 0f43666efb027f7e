//! `domiclaw status`: show configuration and recovery state.

use domiclaw_config::AppConfig;
use domiclaw_core::memory::MemoryStore;
use domiclaw_memory::FileMemory;
use domiclaw_providers::{ProviderKind, select_kind};

use super::{CliResult, load_config};

pub async fn run() -> CliResult {
    let config = load_config(None)?;
    print!("{}", render(&config).await);
    Ok(())
}

/// The status report for `config`.
pub async fn render(config: &AppConfig) -> String {
    let workspace = config.workspace_path();
    let memory = FileMemory::new(&workspace);

    let long_term = memory
        .read_long_term()
        .await
        .map(|text| !text.trim().is_empty())
        .unwrap_or(false);
    let search_key = config
        .tools
        .search
        .api_key
        .as_deref()
        .is_some_and(|k| !k.is_empty());

    format!(
        "DomiClaw Status\n\
         ===============\n\n\
         Workspace:      {}\n\
         Config:         {}\n\
         Model:          {}\n\n\
         Provider:       {}\n\
         API Key:        {}\n\
         Search Key:     {}\n\n\
         Memory:\n  \
           Long-term:    {long_term}\n  \
           Daily dir:    {}\n\n\
         Strategic:      {}\n\n\
         Pending Resume: {}\n",
        workspace.display(),
        AppConfig::config_path().display(),
        config.agent.model,
        provider_label(config),
        configured(config.has_api_key()),
        configured(search_key),
        workspace.join("memory").display(),
        if config.strategic_compact.enabled { "enabled" } else { "disabled" },
        memory.has_pending_resume().await,
    )
}

fn provider_label(config: &AppConfig) -> String {
    match select_kind(config) {
        Ok(ProviderKind::Anthropic) => match &config.providers.anthropic.api_base {
            Some(base) => format!("anthropic (proxy: {base})"),
            None => "anthropic (direct)".into(),
        },
        Ok(kind) => kind.as_str().to_string(),
        Err(_) => "none".into(),
    }
}

fn configured(present: bool) -> &'static str {
    if present { "configured" } else { "not set" }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn report_reflects_workspace_state() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = AppConfig::default();
        config.workspace = dir.path().display().to_string();
        config.providers.anthropic.api_key = Some("sk-ant-test".into());

        let before = render(&config).await;
        assert!(before.starts_with("DomiClaw Status\n===============\n"));
        assert!(before.contains("Provider:       anthropic (direct)"));
        assert!(before.contains("API Key:        configured"));
        assert!(before.contains("Search Key:     not set"));
        assert!(before.contains("Long-term:    false"));
        assert!(before.contains("Pending Resume: false"));

        let memory = FileMemory::new(dir.path());
        memory.write_long_term("# Notes\n").await.unwrap();
        memory
            .write_resume_trigger("session_1", "context_overflow")
            .await
            .unwrap();

        let after = render(&config).await;
        assert!(after.contains("Long-term:    true"));
        assert!(after.contains("Pending Resume: true"));
    }

    #[tokio::test]
    async fn no_key_means_no_provider() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = AppConfig::default();
        config.workspace = dir.path().display().to_string();

        let report = render(&config).await;
        assert!(report.contains("Provider:       none"));
        assert!(report.contains("API Key:        not set"));
    }
}
