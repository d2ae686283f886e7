//! Config command - show or initialize configuration

use super::{CHECK, WARN};
use crate::cli::args::{ConfigAction, ConfigArgs};
use crate::config::{Config, ConfigManager};
use crate::error::PaywireResult;
use console::style;

/// Execute the config command
pub async fn execute(
    args: ConfigArgs,
    config: &Config,
    manager: &ConfigManager,
) -> PaywireResult<()> {
    match args.action {
        None | Some(ConfigAction::Show) => show_config(config)?,
        Some(ConfigAction::Path) => show_path(manager),
        Some(ConfigAction::Init { force }) => init_config(manager, force).await?,
    }

    Ok(())
}

fn show_config(config: &Config) -> PaywireResult<()> {
    let mut shown = config.clone();
    // Never echo the key itself
    if let Some(ref key) = shown.backend.api_key {
        shown.backend.api_key = Some(mask(key));
    }

    println!("{}", toml::to_string_pretty(&shown)?);
    Ok(())
}

fn mask(key: &str) -> String {
    let visible: String = key.chars().take(5).collect();
    format!("{}…", visible)
}

fn show_path(manager: &ConfigManager) {
    println!("{}", manager.path().display());
}

async fn init_config(manager: &ConfigManager, force: bool) -> PaywireResult<()> {
    let path = manager.path();

    if path.exists() && !force {
        println!(
            "{}Config already exists at {}",
            WARN,
            style(path.display()).yellow()
        );
        println!("  Use --force to overwrite");
        return Ok(());
    }

    manager.save(&Config::default()).await?;
    println!(
        "{}Configuration initialized at {}",
        CHECK,
        style(path.display()).green()
    );

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn mask_hides_most_of_key() {
        assert_eq!(mask("appl_abcdefgh"), "appl_…");
        assert_eq!(mask("ab"), "ab…");
    }

    #[tokio::test]
    async fn init_writes_defaults_once() {
        let temp = TempDir::new().unwrap();
        let manager = ConfigManager::with_path(temp.path().join("config.toml"));

        init_config(&manager, false).await.unwrap();
        assert!(manager.path().exists());

        tokio::fs::write(manager.path(), "[backend]\ntimeout_secs = 5\n")
            .await
            .unwrap();
        init_config(&manager, false).await.unwrap();
        assert_eq!(manager.load().await.unwrap().backend.timeout_secs, 5);

        init_config(&manager, true).await.unwrap();
        assert_eq!(manager.load().await.unwrap().backend.timeout_secs, 30);
    }
}
