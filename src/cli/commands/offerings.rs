//! Offerings command - list the offerings configured for a subscriber

use crate::backend::OfferingsPayload;
use crate::cli::args::{OfferingsArgs, OutputFormat};
use crate::config::Config;
use crate::error::PaywireResult;
use crate::shared;
use console::style;

/// Execute the offerings command
pub async fn execute(args: OfferingsArgs, config: &Config) -> PaywireResult<()> {
    let coordinator = shared::configure(config)?;
    let payload = coordinator.fetch_offerings(&args.app_user_id).await?;

    match args.format {
        OutputFormat::Table => print_table(&payload),
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&payload)?),
        OutputFormat::Plain => {
            for offering in &payload.offerings {
                println!("{}", offering.identifier);
            }
        }
    }

    Ok(())
}

fn print_table(payload: &OfferingsPayload) {
    if payload.offerings.is_empty() {
        println!("No offerings configured.");
        return;
    }

    let current = payload.current().map(|o| o.identifier.as_str());

    println!("{:<24} {:<24} {:<32}", "OFFERING", "PACKAGE", "PRODUCT");
    println!("{}", "-".repeat(80));

    for offering in &payload.offerings {
        let name = if Some(offering.identifier.as_str()) == current {
            style(format!("{} *", offering.identifier)).green().to_string()
        } else {
            offering.identifier.clone()
        };

        if offering.packages.is_empty() {
            println!("{:<24} {:<24} {:<32}", name, "-", "-");
        }
        for package in &offering.packages {
            println!(
                "{:<24} {:<24} {:<32}",
                name, package.identifier, package.platform_product_identifier
            );
        }
    }

    println!();
    println!("Total: {} offering(s), * = current", payload.offerings.len());
}
