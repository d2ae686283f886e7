//! Cache command - inspect or clear the ETag cache

use super::CHECK;
use crate::cli::args::{CacheAction, CacheArgs, OutputFormat};
use crate::config::Config;
use crate::error::PaywireResult;
use crate::etag::{EtagEntry, EtagStore, FileEtagStore};

/// Execute the cache command
pub async fn execute(args: CacheArgs, config: &Config) -> PaywireResult<()> {
    // The store is opened directly so no API key is needed
    let store = FileEtagStore::new(config.etag_dir());

    match args.action {
        CacheAction::List { format } => list_entries(&store, format).await,
        CacheAction::Clear => clear_entries(&store).await,
    }
}

async fn list_entries(store: &FileEtagStore, format: OutputFormat) -> PaywireResult<()> {
    let entries = store.entries().await?;

    if entries.is_empty() {
        println!("No ETag entries in {}.", store.dir().display());
        return Ok(());
    }

    match format {
        OutputFormat::Table => print_table(&entries),
        OutputFormat::Json => print_json(&entries)?,
        OutputFormat::Plain => {
            for entry in &entries {
                println!("{}", entry.url);
            }
        }
    }

    Ok(())
}

fn print_table(entries: &[EtagEntry]) {
    println!("{:<60} {:<24} {:<6} {:<20}", "URL", "ETAG", "STATUS", "STORED");
    println!("{}", "-".repeat(112));

    for entry in entries {
        println!(
            "{:<60} {:<24} {:<6} {:<20}",
            entry.url,
            entry.etag,
            entry.status_code,
            entry.stored_at.format("%Y-%m-%d %H:%M")
        );
    }

    println!();
    println!("Total: {} {}", entries.len(), plural(entries.len()));
}

fn print_json(entries: &[EtagEntry]) -> PaywireResult<()> {
    println!("{}", serde_json::to_string_pretty(entries)?);
    Ok(())
}

async fn clear_entries(store: &FileEtagStore) -> PaywireResult<()> {
    let count = store.entries().await?.len();
    store.clear().await?;
    println!("{}Removed {} ETag {}", CHECK, count, plural(count));
    Ok(())
}

fn plural(count: usize) -> &'static str {
    if count == 1 {
        "entry"
    } else {
        "entries"
    }
}
