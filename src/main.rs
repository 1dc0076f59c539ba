mod browser;
mod config;
mod error;
mod models;
mod pipeline;
mod scraper;
mod storage;
mod utils;

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::prelude::*;
use tracing_subscriber::{fmt, EnvFilter};

use crate::config::AppConfig;
use crate::models::{Category, Department, Product};
use crate::pipeline::Pipeline;
use crate::scraper::StorefrontScraper;
use crate::storage::Store;

#[derive(Parser)]
#[command(name = "catalog-crawler", about = "Retail catalog bestseller crawler", version)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,
}

#[derive(Subcommand)]
enum Command {
    /// Run the full crawl: home top sellers, departments, per-department top sellers
    Crawl,

    /// Scrape one department's sub-menu as categories
    Categories {
        /// Scrape-time menu position of the department (1-based)
        #[arg(short, long)]
        position: i64,
    },

    /// List all stored departments
    Departments,

    /// Top products for the home page, or for one department
    Top {
        /// Department id; omit for the home page listing
        #[arg(short, long)]
        department: Option<i64>,

        #[arg(short, long, default_value_t = 3)]
        limit: usize,
    },

    /// Show database statistics
    Stats,

    /// Create the entity tables without crawling
    Migrate,
}

fn init_logging(verbose: u8, config: &AppConfig) -> Result<()> {
    let filter = match verbose {
        0 => "catalog_crawler=info,warn",
        1 => "catalog_crawler=debug,info",
        _ => "trace",
    };

    let registry = tracing_subscriber::registry()
        .with(fmt::layer().compact().with_target(false))
        .with(EnvFilter::new(filter));

    if let Some(path) = &config.logging.file {
        let file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)?;
        registry
            .with(fmt::layer().with_ansi(false).with_writer(Arc::new(file)))
            .init();
    } else {
        registry.init();
    }

    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = AppConfig::load()?;
    init_logging(cli.verbose, &config)?;

    match cli.command {
        Command::Crawl => {
            let _t = utils::Timer::start("Catalog crawl");
            let store = Store::open(&config.storage.db_path)?;
            let mut source = StorefrontScraper::new(&config.crawler)?;

            let stats = Pipeline::new(config).run(&mut source, &store).await?;
            info!(
                "Done: {} home products, {} departments, {} department products",
                stats.home_products, stats.departments, stats.department_products
            );
            for failure in &stats.failures {
                info!(
                    "Unreachable: {} (position {}): {}",
                    failure.name, failure.position, failure.reason
                );
            }
        }

        Command::Categories { position } => {
            let _t = utils::Timer::start("Category scrape");
            let store = Store::open(&config.storage.db_path)?;
            let mut source = StorefrontScraper::new(&config.crawler)?;

            let count = Pipeline::new(config)
                .run_categories(&mut source, &store, position)
                .await?;
            info!("Done: {} categories", count);
        }

        Command::Departments => {
            let store = Store::open(&config.storage.db_path)?;
            store.ensure_table::<Department>()?;

            let departments = store.list_departments()?;
            if departments.is_empty() {
                println!("No departments — run `catalog-crawler crawl` first.");
            } else {
                println!("{} departments:", departments.len());
                for d in &departments {
                    println!("  {:>4}  {}  ({})", d.id, d.name, d.href);
                }
            }
        }

        Command::Top { department, limit } => {
            let store = Store::open(&config.storage.db_path)?;
            store.ensure_table::<Product>()?;

            let products = match department {
                Some(id) => store.top_department_products(id, limit)?,
                None => store.top_home_products(limit)?,
            };
            println!("{}", serde_json::to_string_pretty(&products)?);
        }

        Command::Stats => {
            let store = Store::open(&config.storage.db_path)?;
            store.ensure_table::<Department>()?;
            store.ensure_table::<Product>()?;
            store.ensure_table::<Category>()?;

            println!("─────────────────────────────────");
            println!("  Catalog Crawler — Store Stats");
            println!("─────────────────────────────────");
            println!("  Departments : {}", utils::fmt_number(store.count::<Department>()?));
            println!("  Products    : {}", utils::fmt_number(store.count::<Product>()?));
            println!("  Categories  : {}", utils::fmt_number(store.count::<Category>()?));
            println!("─────────────────────────────────");
        }

        Command::Migrate => {
            let store = Store::open(&config.storage.db_path)?;
            store.ensure_table::<Department>()?;
            store.ensure_table::<Product>()?;
            store.ensure_table::<Category>()?;
            println!("Tables ready.");
        }
    }

    Ok(())
}
