use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;

use tally::api::{ApiClient, ResourceService};
use tally::config::Config;
use tally::ledger::{Category, Entry, EntryDraft, LedgerController};
use tally::util::validate_base_url;

/// Get the config file path (~/.config/tally/config.toml)
fn default_config_path() -> Result<PathBuf> {
    let home = std::env::var("HOME").context("HOME environment variable not set")?;
    Ok(PathBuf::from(home)
        .join(".config")
        .join("tally")
        .join("config.toml"))
}

#[derive(Parser, Debug)]
#[command(name = "tally", about = "Expense ledger backed by a REST endpoint")]
struct Args {
    /// Path to an alternate config file
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Fetch the ledger and print its entries
    List {
        /// Only show entries in this category
        #[arg(long)]
        category: Option<String>,
    },
    /// Add a new entry
    Add {
        description: String,
        amount: f64,
        #[arg(long, default_value = "utilities")]
        category: String,
    },
    /// Delete an entry by id
    Delete { id: u64 },
    /// Update an entry's fields
    Update {
        id: u64,
        #[arg(long)]
        description: Option<String>,
        #[arg(long)]
        amount: Option<f64>,
        #[arg(long)]
        category: Option<String>,
    },
    /// Print the total amount, optionally per category
    Total {
        #[arg(long)]
        category: Option<String>,
    },
}

fn parse_category(raw: Option<&str>) -> Result<Option<Category>> {
    raw.map(|s| s.parse::<Category>().map_err(anyhow::Error::from))
        .transpose()
}

fn print_entries(entries: &[Entry]) {
    if entries.is_empty() {
        println!("No entries found");
        return;
    }
    println!("{:>6}  {:<40} {:>12}  {}", "ID", "DESCRIPTION", "AMOUNT", "CATEGORY");
    for entry in entries {
        println!(
            "{:>6}  {:<40} {:>12}  {}",
            entry.id,
            entry.description,
            format!("${:.2}", entry.amount),
            entry.category,
        );
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing for debug logging
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let args = Args::parse();

    let config_path = match args.config {
        Some(path) => path,
        None => default_config_path()?,
    };
    let config = Config::load(&config_path).context("Failed to load configuration")?;

    let base_url = validate_base_url(&config.base_url)
        .with_context(|| format!("Invalid base_url in config: {}", config.base_url))?;
    let client = ApiClient::new(base_url, config.request_timeout())
        .context("Failed to build HTTP client")?;
    let service = ResourceService::<Entry>::new(&client, &config.endpoint);
    let ledger = LedgerController::new(service.clone());

    match args.command {
        Command::List { category } => {
            let filter = parse_category(category.as_deref())?;
            ledger.refresh().await.context("Failed to fetch entries")?;
            ledger.set_filter(filter);
            print_entries(&ledger.visible_entries());
            println!("Total: ${:.2}", ledger.visible_total());
        }
        Command::Add {
            description,
            amount,
            category,
        } => {
            let category = category
                .parse::<Category>()
                .context("Invalid --category value")?;
            ledger.refresh().await.context("Failed to fetch entries")?;
            let entry = ledger
                .add_synced(EntryDraft::new(description, amount, category))
                .await
                .context("Failed to add entry")?;
            println!(
                "Added entry {}: {} (${:.2}, {})",
                entry.id, entry.description, entry.amount, entry.category
            );
        }
        Command::Delete { id } => {
            ledger.refresh().await.context("Failed to fetch entries")?;
            if ledger
                .delete_synced(id)
                .await
                .context("Failed to delete entry")?
            {
                println!("Deleted entry {}", id);
            } else {
                println!("No entry with id {}", id);
            }
        }
        Command::Update {
            id,
            description,
            amount,
            category,
        } => {
            ledger.refresh().await.context("Failed to fetch entries")?;
            let Some(mut entry) = ledger.visible_entries().into_iter().find(|e| e.id == id)
            else {
                bail!("No entry with id {}", id);
            };
            if let Some(description) = description {
                entry.description = description;
            }
            if let Some(amount) = amount {
                entry.amount = amount;
            }
            if let Some(category) = parse_category(category.as_deref())? {
                entry.category = category;
            }
            let updated = service
                .update(&entry)
                .await
                .context("Failed to update entry")?;
            println!(
                "Updated entry {}: {} (${:.2}, {})",
                updated.id, updated.description, updated.amount, updated.category
            );
        }
        Command::Total { category } => {
            let filter = parse_category(category.as_deref())?;
            ledger.refresh().await.context("Failed to fetch entries")?;
            ledger.set_filter(filter);
            println!("${:.2}", ledger.visible_total());
        }
    }

    Ok(())
}
