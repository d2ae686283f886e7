//! Login command - switch app user ids

use super::CHECK;
use crate::cli::args::LoginArgs;
use crate::config::Config;
use crate::error::PaywireResult;
use crate::shared;
use console::style;

/// Execute the login command
pub async fn execute(args: LoginArgs, config: &Config) -> PaywireResult<()> {
    let coordinator = shared::configure(config)?;
    let outcome = coordinator.login(&args.current, &args.new).await?;

    let verb = if outcome.created { "Created" } else { "Logged in as" };
    println!("{}{} {}", CHECK, verb, style(&args.new).cyan());
    super::subscriber::print_state(&outcome.subscriber);

    Ok(())
}
