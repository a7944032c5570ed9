use anyhow::Context;
use clap::{Parser, Subcommand};
use configuration::ConfigArgs;
use core_types::{Record, Role};
use database::{ConnectionRegistry, Model, Repository};

mod models;

use models::Trade;

/// The main entry point for the modelbase command-line tool.
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Parse command-line arguments
    let cli = Cli::parse();

    configuration::init_tracing("modelbase=info,database=info");
    let config = cli.config.load().context("Failed to load configuration")?;
    let mut registry = ConnectionRegistry::new(config.database);
    tracing::debug!(app = %registry.settings().app.path, source = %registry.settings().source.path, "Registry ready.");

    // Execute the appropriate command
    let result = match cli.command {
        Commands::Inspect => handle_inspect(),
        Commands::Schema { action } => handle_schema(action, &mut registry).await,
        Commands::Demo => handle_demo(&mut registry).await,
    };

    registry.close_all().await;
    if let Err(e) = &result {
        tracing::error!(error = %e, "Command failed.");
    }
    result
}

// ==============================================================================
// CLI Structure
// ==============================================================================

/// Descriptor-driven persistence for models across the app, source and target databases.
#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(flatten)]
    config: ConfigArgs,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the derived table names, columns and sample of the Trade model.
    Inspect,
    /// Create or drop the Trade table in one role's database.
    Schema {
        #[command(subcommand)]
        action: SchemaAction,
    },
    /// Run a short create/read/update/delete session against the app database.
    Demo,
}

#[derive(Subcommand)]
enum SchemaAction {
    Create {
        /// The database to create the table in: app, source or target.
        #[arg(long, default_value = "app")]
        role: Role,
    },
    Drop {
        /// The database to drop the table from: app, source or target.
        #[arg(long, default_value = "app")]
        role: Role,
    },
}

// ==============================================================================
// Command Logic
// ==============================================================================

fn handle_inspect() -> anyhow::Result<()> {
    println!("{}", Trade::descriptor()?.inspect());
    Ok(())
}

async fn handle_schema(action: SchemaAction, registry: &mut ConnectionRegistry) -> anyhow::Result<()> {
    match action {
        SchemaAction::Create { role } => {
            let repo = Repository::<Trade>::for_role(role)?;
            repo.create_table(registry).await?;
            println!("Created `{}` in the {} database.", repo.schema().name(), repo.role());
        }
        SchemaAction::Drop { role } => {
            let repo = Repository::<Trade>::for_role(role)?;
            repo.drop_table(registry).await?;
            println!("Dropped `{}` from the {} database.", repo.schema().name(), repo.role());
        }
    }
    Ok(())
}

/// Walks the sample trade ledger through every repository operation.
async fn handle_demo(registry: &mut ConnectionRegistry) -> anyhow::Result<()> {
    let trades = Repository::<Trade>::new()?;
    trades.drop_table(registry).await?;
    trades.create_table(registry).await?;

    let ibm = trades
        .create(registry, &Trade::new("2024-01-19", "BUY", "IBM", 100, 124.79))
        .await?;
    trades
        .create(registry, &Trade::new("2024-01-19", "BUY", "META", 100, 612.77))
        .await?;
    let loaded = trades
        .batch_create(
            registry,
            &[
                Trade::new("2024-05-18", "SELL", "IBM", 100, 224.00),
                Trade::new("2025-01-19", "BUY", "MSFT", 1000, 72.00),
                Trade::new("2025-01-19", "BUY", "IBM", 500, 53.00),
            ],
        )
        .await?;
    println!("Bulk loaded {} trades.", loaded.len());

    print_trades("All trades", &trades.get_all(registry, &Record::new()).await?)?;
    let filters = Record::new().with("symbol", "IBM");
    print_trades("IBM trades", &trades.get_all(registry, &filters).await?)?;

    let id = ibm.id.context("created trade has no id")?;
    let updated = trades
        .update(registry, id, &Record::new().with("quantity", 200))
        .await?
        .context("created trade disappeared before update")?;
    println!("\nUpdated trade {id}: quantity {} -> {}", ibm.quantity, updated.quantity);

    let removed = trades.delete(registry, id).await?;
    println!("Deleted trade {id}: {removed}");
    println!("Lookup after delete: {:?}", trades.get(registry, id).await?);
    Ok(())
}

fn print_trades(title: &str, trades: &[Trade]) -> anyhow::Result<()> {
    println!("\n{title}:");
    for trade in trades {
        println!("  {}", serde_json::to_string(&database::to_record(trade, None)?.to_json())?);
    }
    Ok(())
}
