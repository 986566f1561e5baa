//! Record-Sweep main entry point
//!
//! This is the command-line interface for the Record-Sweep records harvester.

use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use record_sweep::config::{load_config, load_config_from_env, validate_seeds, Config};
use record_sweep::crawler::CrawlScheduler;
use record_sweep::output::{load_status, print_status};
use record_sweep::search::{SearchService, DEFAULT_LIMIT};
use record_sweep::storage::{open_storage, Storage};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

/// Record-Sweep: a polite public-records harvester
///
/// Record-Sweep crawls seed websites while respecting robots.txt and
/// per-domain delays, extracts name/phone/address/institution records from
/// their pages and stores them in a searchable SQLite database.
#[derive(Parser, Debug)]
#[command(name = "record-sweep")]
#[command(version)]
#[command(about = "A polite public-records harvester", long_about = None)]
struct Cli {
    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    quiet: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Crawl all seeds (or the given URLs) now
    Crawl {
        #[command(flatten)]
        config: ConfigArg,

        /// URL to crawl instead of the configured seeds (repeatable)
        #[arg(long = "url", value_name = "URL")]
        urls: Vec<String>,

        /// Only crawl seeds whose interval has elapsed
        #[arg(long, conflicts_with = "urls")]
        due_only: bool,
    },

    /// Run the periodic scheduler until interrupted
    Schedule {
        #[command(flatten)]
        config: ConfigArg,

        /// Crawl all seeds immediately instead of waiting one interval
        #[arg(long)]
        run_on_start: bool,
    },

    /// Show record and crawl job statistics
    Status {
        #[command(flatten)]
        config: ConfigArg,
    },

    /// Search stored records by attribute
    Search {
        #[command(flatten)]
        config: ConfigArg,

        #[arg(long)]
        name: Option<String>,

        #[arg(long)]
        phone: Option<String>,

        #[arg(long)]
        address: Option<String>,

        #[arg(long)]
        institution: Option<String>,

        #[arg(long)]
        organization: Option<String>,

        /// Maximum number of results
        #[arg(long, default_value_t = DEFAULT_LIMIT)]
        limit: usize,

        /// Print results as JSON
        #[arg(long)]
        json: bool,
    },
}

#[derive(Args, Debug)]
struct ConfigArg {
    /// Path to TOML configuration file (defaults plus environment if omitted)
    #[arg(short, long, value_name = "CONFIG")]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Setup logging based on verbosity
    setup_logging(cli.verbose, cli.quiet);

    match cli.command {
        Command::Crawl {
            config,
            urls,
            due_only,
        } => handle_crawl(config.load()?, urls, due_only).await,
        Command::Schedule {
            config,
            run_on_start,
        } => {
            let mut config = config.load()?;
            config.crawler.run_on_start |= run_on_start;
            handle_schedule(config).await
        }
        Command::Status { config } => handle_status(&config.load()?),
        Command::Search {
            config,
            name,
            phone,
            address,
            institution,
            organization,
            limit,
            json,
        } => {
            let attributes: BTreeMap<String, String> = [
                ("name", name),
                ("phone", phone),
                ("address", address),
                ("institution", institution),
                ("organization", organization),
            ]
            .into_iter()
            .filter_map(|(key, value)| value.map(|v| (key.to_string(), v)))
            .collect();
            handle_search(&config.load()?, &attributes, limit, json)
        }
    }
}

impl ConfigArg {
    fn load(&self) -> anyhow::Result<Config> {
        match &self.config {
            Some(path) => {
                tracing::info!("Loading configuration from: {}", path.display());
                load_config(path)
                    .with_context(|| format!("Failed to load configuration from {}", path.display()))
            }
            None => {
                tracing::debug!("No configuration file given, using defaults");
                load_config_from_env().context("Invalid configuration")
            }
        }
    }
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        // Only show errors
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("record_sweep=info,warn"),
            1 => EnvFilter::new("record_sweep=debug,info"),
            2 => EnvFilter::new("record_sweep=trace,debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .init();
}

fn open_store(config: &Config) -> anyhow::Result<Arc<dyn Storage>> {
    let path = Path::new(&config.storage.database_path);
    let storage = open_storage(path)
        .with_context(|| format!("Failed to open database {}", path.display()))?;
    let store: Arc<dyn Storage> = Arc::new(storage);
    Ok(store)
}

/// Handles the crawl command: a manual trigger or one scheduler tick
async fn handle_crawl(config: Config, urls: Vec<String>, due_only: bool) -> anyhow::Result<()> {
    if !urls.is_empty() {
        validate_seeds(&urls)?;
    }

    let store = open_store(&config)?;
    let scheduler = CrawlScheduler::new(config, store);

    let crawl = async {
        if due_only {
            scheduler.run_tick().await
        } else if urls.is_empty() {
            scheduler.trigger(None).await
        } else {
            scheduler.trigger(Some(urls)).await
        }
    };
    tokio::pin!(crawl);

    let pages = tokio::select! {
        pages = &mut crawl => pages?,
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("Interrupted, stopping after the current page");
            scheduler.abort_crawls();
            crawl.await?
        }
    };

    tracing::info!("Crawl finished: {} pages crawled", pages);
    Ok(())
}

/// Handles the schedule command: runs until Ctrl-C
async fn handle_schedule(config: Config) -> anyhow::Result<()> {
    let store = open_store(&config)?;
    tracing::info!("Scheduling {} seed URLs", config.seeds.len());

    let scheduler = Arc::new(CrawlScheduler::new(config, store));
    scheduler.start();

    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for Ctrl-C")?;

    tracing::info!("Interrupted, waiting for any running crawl to finish");
    scheduler.shutdown().await;
    Ok(())
}

/// Handles the status command: shows statistics from the database
fn handle_status(config: &Config) -> anyhow::Result<()> {
    println!("Database: {}\n", config.storage.database_path);

    let store = open_store(config)?;
    let report = load_status(store.as_ref())?;
    print_status(&report);

    Ok(())
}

/// Handles the search command
fn handle_search(
    config: &Config,
    attributes: &BTreeMap<String, String>,
    limit: usize,
    json: bool,
) -> anyhow::Result<()> {
    let store = open_store(config)?;
    let service = SearchService::from_config(&config.storage, store);
    service.purge_cache()?;
    let results = service.search_by_attributes(attributes, limit)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&results)?);
        return Ok(());
    }

    println!("Found {} records\n", results.len());
    for stored in &results {
        let record = &stored.record;
        println!("#{} {}", stored.id, record.source_url);
        for (label, value) in [
            ("Name", &record.name),
            ("Phone", &record.phone),
            ("Address", &record.address),
            ("Institution", &record.institution),
            ("Organization", &record.organization),
        ] {
            if let Some(value) = value {
                println!("  {}: {}", label, value);
            }
        }
        for (key, value) in &record.metadata {
            println!("  {}: {}", key, value);
        }
        println!();
    }

    Ok(())
}
