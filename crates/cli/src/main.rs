//! AZMOTOS CLI - Catalog operator tools.
//!
//! # Usage
//!
//! ```bash
//! # List the catalog, optionally filtered the same way the storefront filters
//! az-cli catalog list --brand BMW --search adventure
//!
//! # Show one motorcycle
//! az-cli catalog show 6f1c7a52-2b0e-4d8c-9a43-1e2f3a4b5c6d
//!
//! # Insert motorcycles from a YAML file
//! az-cli seed catalog data/motorcycles.yaml
//! ```
//!
//! # Environment
//!
//! `SUPABASE_URL` and `SUPABASE_SERVICE_KEY` (seeding needs write access).

#![cfg_attr(not(test), forbid(unsafe_code))]

use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(name = "az-cli")]
#[command(author, version, about = "AZMOTOS catalog tools")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Browse the motorcycle catalog
    Catalog {
        #[command(subcommand)]
        action: CatalogAction,
    },
    /// Seed backend tables
    Seed {
        #[command(subcommand)]
        target: SeedTarget,
    },
}

#[derive(Subcommand)]
enum CatalogAction {
    /// List motorcycles matching a filter
    List {
        /// Brand name, or `all`
        #[arg(short, long, default_value = "all")]
        brand: String,

        /// Case-insensitive term matched against brand, model and description
        #[arg(short, long, default_value = "")]
        search: String,
    },
    /// Show one motorcycle
    Show {
        /// Motorcycle id (UUID)
        id: String,
    },
}

#[derive(Subcommand)]
enum SeedTarget {
    /// Insert motorcycles from a YAML list
    Catalog {
        /// Path to the YAML file
        file: String,
    },
}

#[tokio::main]
async fn main() {
    // Initialize tracing
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();

    let result: Result<(), Box<dyn std::error::Error>> = run(cli).await;

    if let Err(e) = result {
        tracing::error!("Command failed: {e}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    match cli.command {
        Commands::Catalog { action } => match action {
            CatalogAction::List { brand, search } => {
                commands::catalog::list(&brand, &search).await?;
            }
            CatalogAction::Show { id } => commands::catalog::show(&id).await?,
        },
        Commands::Seed { target } => match target {
            SeedTarget::Catalog { file } => commands::seed::catalog(&file).await?,
        },
    }
    Ok(())
}
