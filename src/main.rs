//! Crawl-Dispatch main entry point
//!
//! This is the command-line interface for the Crawl-Dispatch crawler.

use anyhow::Context;
use clap::Parser;
use crawl_dispatch::config::{load_config_with_hash, Config};
use crawl_dispatch::crawler::{crawl, CrawlOptions};
use crawl_dispatch::output::{load_statistics, print_statistics};
use crawl_dispatch::storage::open_storage;
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

/// Crawl-Dispatch: a fault-tolerant crawler for web sites and file trees
///
/// Crawl-Dispatch routes every URL to a protocol client, retries failed
/// fetches, and keeps a de-duplicated frontier per session so an
/// interrupted crawl can be resumed.
#[derive(Parser, Debug)]
#[command(name = "crawl-dispatch")]
#[command(version)]
#[command(about = "A fault-tolerant crawler", long_about = None)]
struct Cli {
    /// Path to TOML configuration file
    #[arg(value_name = "CONFIG")]
    config: PathBuf,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,

    /// Start a fresh crawl, dropping pending urls and results of the session
    #[arg(long)]
    fresh: bool,

    /// Re-crawl the urls of a previous session, skipping unchanged content
    #[arg(long, value_name = "SESSION", conflicts_with = "fresh")]
    incremental: Option<String>,

    /// Validate config and show what would be crawled without actually crawling
    #[arg(long, conflicts_with = "stats")]
    dry_run: bool,

    /// Show statistics of the session and exit
    #[arg(long, conflicts_with = "dry_run")]
    stats: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    setup_logging(cli.verbose, cli.quiet);

    tracing::info!("Loading configuration from: {}", cli.config.display());
    let (config, hash) = load_config_with_hash(&cli.config)
        .with_context(|| format!("Failed to load configuration {}", cli.config.display()))?;
    tracing::info!("Configuration loaded successfully (hash: {})", hash);

    if cli.dry_run {
        handle_dry_run(&config);
    } else if cli.stats {
        handle_stats(&config)?;
    } else {
        let options = CrawlOptions {
            fresh: cli.fresh,
            previous_session: cli.incremental,
        };
        handle_crawl(&config, &options).await?;
    }

    Ok(())
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("crawl_dispatch=info,warn"),
            1 => EnvFilter::new("crawl_dispatch=debug,info"),
            2 => EnvFilter::new("crawl_dispatch=trace,debug"),
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

/// Handles the --dry-run mode: shows the validated configuration
fn handle_dry_run(config: &Config) {
    println!("=== Crawl-Dispatch Dry Run ===\n");

    println!("Crawler Configuration:");
    println!("  Session: {}", config.crawler.session_id);
    println!("  Workers: {}", config.crawler.thread_count);
    match config.crawler.max_depth {
        Some(depth) => println!("  Max depth: {}", depth),
        None => println!("  Max depth: unlimited"),
    }
    if config.crawler.max_access_count > 0 {
        println!("  Max access count: {}", config.crawler.max_access_count);
    }
    if config.crawler.delay_before_processing > 0 || config.crawler.delay_after_processing > 0 {
        println!(
            "  Delay: {}ms before, {}ms after each url",
            config.crawler.delay_before_processing, config.crawler.delay_after_processing
        );
    }
    for pattern in &config.crawler.include {
        println!("  + include {}", pattern);
    }
    for pattern in &config.crawler.exclude {
        println!("  - exclude {}", pattern);
    }

    println!("\nClients:");
    println!("  Max retry count: {}", config.client.max_retry_count);
    println!("  Retry interval: {}ms", config.client.retry_interval);
    if let Some(timeout) = config.client.access_timeout {
        println!("  Access timeout: {}ms", timeout);
    }
    println!("  User agent: {}", config.client.user_agent);
    for rule in &config.client.rules {
        println!("  - {} -> {:?}", rule.pattern, rule.client);
    }

    println!("\nContent Length:");
    println!("  Default: {} bytes", config.content_length.default);
    for (mime_type, limit) in &config.content_length.mime_types {
        println!("  - {}: {} bytes", mime_type, limit);
    }

    println!("\nOutput:");
    println!("  Database: {}", config.output.database_path);

    println!("\nSeeds ({}):", config.crawler.seeds.len());
    for seed in &config.crawler.seeds {
        println!("  * {}", seed);
    }

    println!("\n✓ Configuration is valid");
}

/// Handles the --stats mode: shows statistics of the session
fn handle_stats(config: &Config) -> anyhow::Result<()> {
    println!("Database: {}\n", config.output.database_path);

    let storage = open_storage(Path::new(&config.output.database_path))?;
    let stats = load_statistics(&storage, &storage, &config.crawler.session_id)?;
    print_statistics(&stats);

    Ok(())
}

/// Handles the main crawl operation
async fn handle_crawl(config: &Config, options: &CrawlOptions) -> anyhow::Result<()> {
    if options.fresh {
        tracing::info!("Starting fresh crawl (ignoring previous state)");
    } else if let Some(previous) = &options.previous_session {
        tracing::info!("Starting incremental crawl from session {}", previous);
    } else {
        tracing::info!("Starting crawl (will resume pending urls of the session)");
    }

    let summary = crawl(config, options)
        .await
        .context("Crawl failed")?;
    tracing::info!(
        "Crawl completed successfully: {} urls processed",
        summary.processed
    );

    Ok(())
}
