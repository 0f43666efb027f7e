//! `domiclaw init`: first-time setup.

use std::path::Path;

use domiclaw_config::AppConfig;
use domiclaw_memory::FileMemory;

use super::CliResult;

const INITIAL_MEMORY: &str = "# DomiClaw Memory

## Identity
- I am DomiClaw, an AI coding assistant with persistent memory
- I remember context across sessions through this file

## Preferences
- (Add your preferences here)

## Important Information
- (Add important info here)
";

pub async fn run() -> CliResult {
    let config_path = AppConfig::config_path();
    let config = setup(&config_path).await?;

    println!();
    println!("DomiClaw initialized successfully!");
    println!();
    println!("Workspace: {}", config.workspace_path().display());
    println!("Config:    {}", config_path.display());
    println!();
    println!("Next steps:");
    println!("1. Set your API key: export ANTHROPIC_API_KEY=\"your-key\"");
    println!("2. Run: domiclaw run -m \"Your prompt here\"");
    Ok(())
}

/// Write a default config unless one exists, then create the workspace and
/// seed `MEMORY.md`. Existing files are left alone.
async fn setup(config_path: &Path) -> CliResult<AppConfig> {
    let config = if config_path.exists() {
        println!("Config already exists at: {}", config_path.display());
        AppConfig::load_from(config_path)?
    } else {
        if let Some(dir) = config_path.parent() {
            std::fs::create_dir_all(dir)?;
        }
        std::fs::write(config_path, AppConfig::default_toml())?;
        println!("Created config at: {}", config_path.display());
        AppConfig::default()
    };

    let workspace = config.workspace_path();
    std::fs::create_dir_all(workspace.join("memory"))?;

    let memory = FileMemory::new(&workspace);
    if memory.read_long_term().await?.trim().is_empty() {
        memory.write_long_term(INITIAL_MEMORY).await?;
        println!("Created {}", memory.long_term_path().display());
    }

    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config_in(dir: &Path, workspace: &Path) -> std::path::PathBuf {
        let path = dir.join("config.toml");
        std::fs::write(
            &path,
            format!("workspace = {:?}\n", workspace.display().to_string()),
        )
        .unwrap();
        path
    }

    #[tokio::test]
    async fn seeds_workspace_and_memory() {
        let dir = tempfile::tempdir().unwrap();
        let workspace = dir.path().join("ws");
        let path = config_in(dir.path(), &workspace);

        let config = setup(&path).await.unwrap();
        assert_eq!(config.workspace_path(), workspace);
        assert!(workspace.join("memory").is_dir());

        let seeded = std::fs::read_to_string(workspace.join("MEMORY.md")).unwrap();
        assert!(seeded.starts_with("# DomiClaw Memory\n\n## Identity\n"));
    }

    #[tokio::test]
    async fn keeps_existing_memory() {
        let dir = tempfile::tempdir().unwrap();
        let workspace = dir.path().join("ws");
        std::fs::create_dir_all(&workspace).unwrap();
        std::fs::write(workspace.join("MEMORY.md"), "my notes\n").unwrap();
        let path = config_in(dir.path(), &workspace);

        setup(&path).await.unwrap();
        assert_eq!(
            std::fs::read_to_string(workspace.join("MEMORY.md")).unwrap(),
            "my notes\n"
        );
    }
}
