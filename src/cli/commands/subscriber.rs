//! Subscriber command - fetch a subscriber's state

use crate::backend::SubscriberState;
use crate::cli::args::{OutputFormat, SubscriberArgs};
use crate::config::Config;
use crate::error::PaywireResult;
use crate::shared;
use console::style;

/// Execute the subscriber command
pub async fn execute(args: SubscriberArgs, config: &Config) -> PaywireResult<()> {
    let coordinator = shared::configure(config)?;
    let state = coordinator.fetch_subscriber_state(&args.app_user_id).await?;

    match args.format {
        OutputFormat::Table => print_state(&state),
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&state)?),
        OutputFormat::Plain => {
            for name in state.subscriber.entitlements.keys() {
                println!("{}", name);
            }
        }
    }

    Ok(())
}

pub(crate) fn print_state(state: &SubscriberState) {
    let subscriber = &state.subscriber;

    println!(
        "{} {}",
        style("Subscriber:").bold(),
        style(&subscriber.original_app_user_id).cyan()
    );
    if let Some(ref first_seen) = subscriber.first_seen {
        println!("  First seen:    {}", first_seen);
    }
    if let Some(ref url) = subscriber.management_url {
        println!("  Management:    {}", url);
    }

    println!("{}", style("Entitlements:").bold());
    if subscriber.entitlements.is_empty() {
        println!("  {}", style("none").dim());
    }
    for name in subscriber.entitlements.keys() {
        println!("  {}", name);
    }

    println!(
        "{} {} subscription(s), {} other purchase(s)",
        style("Purchases:").bold(),
        subscriber.subscriptions.len(),
        subscriber.non_subscriptions.len()
    );
}
