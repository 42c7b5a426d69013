mod api;
mod config;
mod matching;
mod models;
mod scrapers;
mod store;

use anyhow::Result;
use clap::{Parser, Subcommand};
use crate::config::{ScraperConfig, DEFAULT_CONFIG_PATH, DEFAULT_DATA_PATH, ENV_FILE_NAME};
use crate::matching::{GroupingStrategy, MatchThresholds, ProductMatcher, TermVectorSimilarity};
use crate::scrapers::RunOptions;
use crate::store::JsonStore;
use std::path::{Path, PathBuf};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

/// Building material scraper and price comparison
#[derive(Parser, Debug)]
#[command(name = "material-scout", version, about)]
struct Cli {
    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Scrape supplier listings and merge them into the data file
    Scrape {
        /// Supplier name, or `all`
        #[arg(short, long, default_value = "all")]
        supplier: String,

        #[arg(short, long, default_value = DEFAULT_CONFIG_PATH)]
        config: PathBuf,

        /// Data file; defaults to the config's output_path
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Show the browser window
        #[arg(long)]
        headed: bool,

        /// Where to dump the last page's HTML and screenshot when a wait fails
        #[arg(long)]
        debug_dir: Option<PathBuf>,
    },
    /// Serve the JSON API and the dashboard
    Serve {
        #[arg(long, default_value = "127.0.0.1")]
        host: String,

        #[arg(short, long, default_value_t = 8000)]
        port: u16,

        /// Data file; defaults to the config's output_path
        #[arg(short, long)]
        data: Option<PathBuf>,

        #[arg(short, long, default_value = DEFAULT_CONFIG_PATH)]
        config: PathBuf,
    },
    /// Print products sold by more than one supplier
    Compare {
        #[arg(short, long, default_value = DEFAULT_DATA_PATH)]
        data: PathBuf,

        /// Also print the normalized view of products containing this keyword
        #[arg(short, long)]
        keyword: Option<String>,

        /// Group by connected components instead of greedy absorption
        #[arg(long)]
        connected: bool,

        /// Name similarity a pair must exceed
        #[arg(long, default_value_t = 0.6)]
        name_threshold: f64,

        /// Category similarity a pair must exceed
        #[arg(long, default_value_t = 0.5)]
        category_threshold: f64,
    },
}

fn init_logging(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

/// `explicit`, else the config's output path, else the default data path
fn resolve_data_path(explicit: Option<PathBuf>, config_path: &Path) -> PathBuf {
    if let Some(path) = explicit {
        return path;
    }
    match ScraperConfig::load(config_path) {
        Ok(config) => config.output_path,
        Err(e) => {
            warn!("Using {}: {:#}", DEFAULT_DATA_PATH, e);
            PathBuf::from(DEFAULT_DATA_PATH)
        }
    }
}

async fn scrape(
    supplier: &str,
    config_path: &Path,
    output: Option<PathBuf>,
    options: RunOptions,
) -> Result<()> {
    let config = ScraperConfig::load(config_path)?;
    info!("🧱 Material Scout - scraping '{}'", supplier);

    let products = scrapers::run(&config, supplier, &options).await?;
    info!("✅ Scraped {} products", products.len());

    let store = JsonStore::new(output.unwrap_or_else(|| config.output_path.clone()));
    let report = store.merge_save(products)?;
    info!(
        "💾 {} new, {} already stored, {} total in {}",
        report.added,
        report.skipped,
        report.existing + report.added,
        store.path().display()
    );
    Ok(())
}

fn compare(
    data: &Path,
    keyword: Option<&str>,
    strategy: GroupingStrategy,
    thresholds: MatchThresholds,
) -> Result<()> {
    let products = JsonStore::new(data).load()?;
    let matcher = ProductMatcher::new(TermVectorSimilarity::new())
        .with_strategy(strategy)
        .with_thresholds(thresholds);
    info!(
        "Comparing {} products ({:?}, name > {}, category > {})",
        products.len(),
        matcher.strategy(),
        thresholds.name,
        thresholds.category
    );

    if let Some(keyword) = keyword {
        println!("Normalized products containing '{}':", keyword);
        for entry in matcher.debug_matches(&products, keyword) {
            println!("  [{}] {}", entry.product.supplier, entry.product.name);
            println!("      name:     {}", entry.name);
            println!("      category: {} ({})", entry.category, entry.raw_categories);
        }
        println!();
    }

    let groups = matcher.group(&products);
    if groups.is_empty() {
        println!("No matching products found across suppliers.");
        return Ok(());
    }
    for (i, group) in groups.iter().enumerate() {
        println!("{}. {} ({} suppliers)", i + 1, group.title(), group.supplier_count());
        for product in &group.members {
            println!(
                "   {:<12} {:>12}  {}",
                product.supplier,
                product.price.as_deref().unwrap_or("-"),
                product.name
            );
            println!("   {:<12} {:>12}  {}", "", "", product.url);
        }
        println!();
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match cli.command {
        Command::Scrape {
            supplier,
            config,
            output,
            headed,
            debug_dir,
        } => {
            let options = RunOptions {
                headed,
                debug_dir,
                env_file: Some(config.with_file_name(ENV_FILE_NAME)),
            };
            scrape(&supplier, &config, output, options).await
        }
        Command::Serve {
            host,
            port,
            data,
            config,
        } => {
            let data = resolve_data_path(data, &config);
            api::serve(&host, port, data).await
        }
        Command::Compare {
            data,
            keyword,
            connected,
            name_threshold,
            category_threshold,
        } => {
            let strategy = if connected {
                GroupingStrategy::Connected
            } else {
                GroupingStrategy::Greedy
            };
            let thresholds = MatchThresholds {
                name: name_threshold,
                category: category_threshold,
            };
            compare(&data, keyword.as_deref(), strategy, thresholds)
        }
    }
}
