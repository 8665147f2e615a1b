mod catalog;
mod models;
mod scrapers;
mod server;

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::EnvFilter;

use models::Catalog;
use scrapers::types::{ScrapeParams, STANDVIRTUAL_URL};
use scrapers::{StandVirtualScraper, VehicleSource};

#[derive(Parser)]
#[command(author, version, about = "Keeps a dealership vehicle catalog in sync with StandVirtual")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Scrape the inventory and rewrite the catalog file
    Update {
        /// Listing URL to scrape
        #[arg(long, default_value = STANDVIRTUAL_URL)]
        url: String,
        /// Maximum listing pages to fetch
        #[arg(long, default_value_t = 3)]
        max_pages: u32,
        /// Catalog file to replace
        #[arg(short, long, default_value = "vehicles.json")]
        output: PathBuf,
    },
    /// Serve the catalog on demand over HTTP
    Serve {
        /// Listing URL to scrape
        #[arg(long, default_value = STANDVIRTUAL_URL)]
        url: String,
        /// Maximum listing pages to fetch per request
        #[arg(long, default_value_t = 2)]
        max_pages: u32,
        /// Address to listen on
        #[arg(long, default_value = "0.0.0.0:8080")]
        bind: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    match Cli::parse().command {
        Command::Update {
            url,
            max_pages,
            output,
        } => update(url, max_pages, output).await,
        Command::Serve {
            url,
            max_pages,
            bind,
        } => {
            let scraper = StandVirtualScraper::new(ScrapeParams {
                base_url: url,
                max_pages,
                ..ScrapeParams::default()
            });
            server::run(&bind, Arc::new(scraper)).await?;
            Ok(())
        }
    }
}

/// Batch mode: one full scrape, then an atomic catalog rewrite
async fn update(url: String, max_pages: u32, output: PathBuf) -> anyhow::Result<()> {
    info!("🚗 Inventory Scout - StandVirtual catalog update");

    let scraper = StandVirtualScraper::new(ScrapeParams {
        base_url: url,
        max_pages,
        ..ScrapeParams::default()
    });

    let vehicles = scraper.scrape().await?;
    let catalog = Catalog::new(vehicles, scraper.source_url());
    catalog::write_catalog(&catalog, &output)?;

    info!("✅ Catalog now lists {} vehicles", catalog.total_vehicles);
    info!("🕐 Last update: {}", catalog.last_update);
    Ok(())
}
