//! Catalog Harvester main entry point
//!
//! This is the command-line interface for the catalog harvester.

use catalog_harvester::config::{load_config_with_hash, validate, Config};
use catalog_harvester::crawler::{harvest, listing_urls};
use catalog_harvester::output::print_report;
use clap::Parser;
use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

/// Catalog Harvester: a bounded-concurrency catalog crawler
///
/// Walks the listing pages of a catalog site, fetches every detail page
/// through a rotating pool of proxies and exports the extracted records
/// to CSV.
#[derive(Parser, Debug)]
#[command(name = "catalog-harvester")]
#[command(version)]
#[command(about = "A bounded-concurrency catalog crawler", long_about = None)]
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

    /// Validate config and show what would be harvested without fetching anything
    #[arg(long)]
    dry_run: bool,

    /// Override the concurrency limit from the config file
    #[arg(long, value_name = "N")]
    concurrency: Option<usize>,

    /// Override the CSV output path from the config file
    #[arg(short, long, value_name = "PATH")]
    output: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let (mut config, config_hash) = match load_config_with_hash(&cli.config) {
        Ok(loaded) => loaded,
        Err(e) => {
            setup_logging(cli.verbose, cli.quiet, None)?;
            tracing::error!("Failed to load configuration: {}", e);
            return Err(e.into());
        }
    };

    if let Some(concurrency) = cli.concurrency {
        config.crawler.concurrency = concurrency;
    }
    if let Some(output) = &cli.output {
        config.output.csv_path = output.display().to_string();
    }

    let log_file = config.output.log_file.clone().map(PathBuf::from);
    setup_logging(cli.verbose, cli.quiet, log_file.as_deref())?;

    tracing::info!("Loaded configuration from: {}", cli.config.display());
    tracing::debug!("Configuration hash: {}", config_hash);

    // Overrides have not been through validation yet
    if let Err(e) = validate(&config) {
        tracing::error!("Invalid configuration: {}", e);
        return Err(e.into());
    }

    if cli.dry_run {
        handle_dry_run(&config);
        return Ok(());
    }

    handle_harvest(config).await
}

/// Sets up the logging/tracing subscriber
///
/// Events go to the console and, when `log_file` is set, to that file as
/// well. The file is truncated at startup.
fn setup_logging(verbose: u8, quiet: bool, log_file: Option<&Path>) -> std::io::Result<()> {
    let filter = if quiet {
        // Only show errors
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("catalog_harvester=info,warn"),
            1 => EnvFilter::new("catalog_harvester=debug,info"),
            2 => EnvFilter::new("catalog_harvester=trace,debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    let console_layer = fmt::layer()
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false);

    let file_layer = match log_file {
        Some(path) => {
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                std::fs::create_dir_all(parent)?;
            }
            let file = File::create(path)?;
            Some(
                fmt::layer()
                    .with_ansi(false)
                    .with_file(true)
                    .with_line_number(true)
                    .with_writer(Mutex::new(file)),
            )
        }
        None => None,
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(console_layer)
        .with(file_layer)
        .init();

    Ok(())
}

/// Handles the --dry-run mode: shows what would be harvested
fn handle_dry_run(config: &Config) {
    println!("=== Catalog Harvester Dry Run ===\n");

    println!("Crawler Configuration:");
    println!("  Concurrency limit: {}", config.crawler.concurrency);
    match config.crawler.run_timeout_secs {
        0 => println!("  Run timeout: none"),
        secs => println!("  Run timeout: {}s", secs),
    }

    println!("\nHTTP:");
    println!(
        "  Timeouts: total {}s, connect {}s, read {}s",
        config.http.total_timeout_secs,
        config.http.connect_timeout_secs,
        config.http.read_timeout_secs
    );
    for (name, value) in &config.http.headers {
        println!("  {}: {}", name, value);
    }

    println!("\nRetry:");
    println!("  Max attempts: {}", config.retry.max_attempts);
    println!(
        "  Backoff: {}ms to {}ms (x{})",
        config.retry.min_delay_ms, config.retry.max_delay_ms, config.retry.multiplier
    );

    println!("\nProxies ({}):", config.http.proxies.len());
    if config.http.proxies.is_empty() {
        println!("  - direct");
    }
    for proxy in &config.http.proxies {
        println!("  - {}", proxy);
    }

    let urls = listing_urls(&config.listing);
    println!("\nListing Pages ({}):", urls.len());
    for url in urls.iter().take(3) {
        println!("  * {}", url);
    }
    if urls.len() > 4 {
        println!("  ...");
    }
    if urls.len() > 3 {
        if let Some(last) = urls.last() {
            println!("  * {}", last);
        }
    }

    println!("\nOutput:");
    println!("  CSV: {}", config.output.csv_path);
    if let Some(log_file) = &config.output.log_file {
        println!("  Log: {}", log_file);
    }

    println!("\n✓ Configuration is valid");
    println!("✓ Would start harvesting {} listing pages", urls.len());
}

/// Handles the main harvest operation
async fn handle_harvest(config: Config) -> Result<(), Box<dyn std::error::Error>> {
    tracing::info!(
        "Listing pages: {}, proxies: {}, concurrency: {}",
        listing_urls(&config.listing).len(),
        config.http.proxies.len(),
        config.crawler.concurrency
    );

    match harvest(config).await {
        Ok((report, export)) => {
            print_report(&report, &export);
            Ok(())
        }
        Err(e) => {
            tracing::error!("Harvest failed: {}", e);
            Err(e.into())
        }
    }
}
