//! CLI argument definitions using clap derive

use clap::{ArgAction, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// Paywire - purchases backend client
///
/// Talks to the subscription backend with request coalescing and ETag
/// caching. Useful for inspecting subscribers and offerings by hand.
#[derive(Parser, Debug)]
#[command(name = "paywire")]
#[command(author, version, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,

    /// Increase verbosity (-v info, -vv debug)
    #[arg(short, long, global = true, action = ArgAction::Count)]
    pub verbose: u8,

    /// Configuration file path
    #[arg(short, long, global = true, env = "PAYWIRE_CONFIG")]
    pub config: Option<PathBuf>,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Fetch a subscriber's current state
    Subscriber(SubscriberArgs),

    /// Fetch the offerings configured for a subscriber
    Offerings(OfferingsArgs),

    /// Log in as a different app user id
    Login(LoginArgs),

    /// Inspect or clear the ETag cache
    Cache(CacheArgs),

    /// Show or initialize configuration
    Config(ConfigArgs),
}

/// Arguments for the subscriber command
#[derive(Parser, Debug)]
pub struct SubscriberArgs {
    /// App user id
    pub app_user_id: String,

    /// Output format
    #[arg(short, long, default_value = "table")]
    pub format: OutputFormat,
}

/// Arguments for the offerings command
#[derive(Parser, Debug)]
pub struct OfferingsArgs {
    /// App user id
    pub app_user_id: String,

    /// Output format
    #[arg(short, long, default_value = "table")]
    pub format: OutputFormat,
}

/// Arguments for the login command
#[derive(Parser, Debug)]
pub struct LoginArgs {
    /// App user id currently in use
    pub current: String,

    /// App user id to switch to
    pub new: String,
}

/// Arguments for the cache command
#[derive(Parser, Debug)]
pub struct CacheArgs {
    /// Subcommand for cache
    #[command(subcommand)]
    pub action: CacheAction,
}

/// Cache subcommands
#[derive(Subcommand, Debug)]
pub enum CacheAction {
    /// List stored ETag entries
    List {
        /// Output format
        #[arg(short, long, default_value = "table")]
        format: OutputFormat,
    },

    /// Remove every stored ETag entry
    Clear,
}

/// Arguments for the config command
#[derive(Parser, Debug)]
pub struct ConfigArgs {
    /// Subcommand for config
    #[command(subcommand)]
    pub action: Option<ConfigAction>,
}

/// Config subcommands
#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Show current configuration
    Show,

    /// Show configuration file path
    Path,

    /// Initialize default configuration
    Init {
        /// Overwrite existing configuration
        #[arg(short, long)]
        force: bool,
    },
}

/// Output format for command results
#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable table
    Table,
    /// JSON output
    Json,
    /// Simple text (one per line)
    Plain,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn about_comes_from_doc_comment() {
        let about = Cli::command().get_about().map(|a| a.to_string());
        assert_eq!(about.as_deref(), Some("Paywire - purchases backend client"));
    }

    #[test]
    fn parses_cache_clear() {
        let cli = Cli::try_parse_from(["paywire", "-vv", "cache", "clear"]).unwrap();
        assert_eq!(cli.verbose, 2);
        assert!(matches!(
            cli.command,
            Commands::Cache(CacheArgs {
                action: CacheAction::Clear
            })
        ));
    }

    #[test]
    fn parses_login() {
        let cli = Cli::try_parse_from(["paywire", "login", "old", "new"]).unwrap();
        match cli.command {
            Commands::Login(args) => {
                assert_eq!(args.current, "old");
                assert_eq!(args.new, "new");
            }
            other => panic!("unexpected command {:?}", other),
        }
    }
}
