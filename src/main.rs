//! Listing-Watch main entry point
//!
//! This is the command-line interface for the Listing-Watch monitor.

use anyhow::Context;
use clap::Parser;
use listing_watch::config::{load_config_with_hash, Config, SiteKind};
use listing_watch::crawler::Coordinator;
use listing_watch::notify::{Notifier, TelegramNotifier};
use listing_watch::proxies::load_proxies;
use listing_watch::storage::open_store;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

/// Listing-Watch: a polite real-estate listing monitor
///
/// Listing-Watch crawls the configured search pages under per-site rate
/// limits, rotating proxies on failure, and alerts on listings that were
/// not seen on earlier runs.
#[derive(Parser, Debug)]
#[command(name = "listing-watch")]
#[command(version = "1.0.0")]
#[command(about = "A polite real-estate listing monitor", long_about = None)]
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

    /// Crawl and store new listings without sending alerts
    #[arg(long, conflicts_with = "dry_run")]
    shadow: bool,

    /// Validate config and show what would be searched without crawling
    #[arg(long)]
    dry_run: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Setup logging based on verbosity
    setup_logging(cli.verbose, cli.quiet);

    // Load and validate configuration
    tracing::info!("Loading configuration from: {}", cli.config.display());
    let (config, config_hash) = match load_config_with_hash(&cli.config) {
        Ok((cfg, hash)) => {
            tracing::info!("Configuration loaded successfully (hash: {})", hash);
            (cfg, hash)
        }
        Err(e) => {
            tracing::error!("Failed to load configuration: {}", e);
            return Err(e.into());
        }
    };

    if cli.dry_run {
        handle_dry_run(&config)?;
    } else {
        handle_watch(config, &config_hash, cli.shadow).await?;
    }

    Ok(())
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        // Only show errors
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("listing_watch=info,warn"),
            1 => EnvFilter::new("listing_watch=debug,info"),
            2 => EnvFilter::new("listing_watch=trace,debug"),
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

/// Handles the --dry-run mode: validates config and shows what would be searched
fn handle_dry_run(config: &Config) -> anyhow::Result<()> {
    println!("=== Listing-Watch Dry Run ===\n");

    println!("Crawler Configuration:");
    println!("  Request timeout: {}s", config.crawler.request_timeout_secs);
    println!(
        "  Empty page retries: {} attempts, {}s apart",
        config.crawler.zero_results_attempts, config.crawler.zero_results_delay_secs
    );

    println!("\nStore:");
    println!("  Database: {}", config.store.database_path);

    println!("\nNotifier:");
    match &config.notifier {
        Some(notifier) => println!("  Telegram chat {} via {}", notifier.chat_id, notifier.base_url),
        None => println!("  None (new listings are only stored)"),
    }

    println!("\nProxies:");
    println!("  Configured addresses: {}", config.proxies.addresses.len());
    if let Some(url) = &config.proxies.source_url {
        println!("  Proxy list page: {}", url);
    }

    println!("\nSites ({}):", config.sites.len());
    for site in &config.sites {
        let kind = match site.kind {
            SiteKind::AnchorPattern => "anchor-pattern",
            SiteKind::EmbeddedJson => "embedded-json",
        };
        println!(
            "  - {} ({}, {} rps{})",
            site.name,
            kind,
            site.rps,
            if site.use_proxies { ", proxied" } else { "" }
        );
    }

    println!("\nSearches ({}):", config.searches.len());
    for search in &config.searches {
        let site = config
            .site_for(&search.url)
            .map(|s| s.name.as_str())
            .unwrap_or("no matching site");
        println!("  - [{}] {} -> {}", search.mode, search.url, site);
    }

    println!("\n✓ Configuration is valid");
    println!("✓ Would run {} searches", config.searches.len());

    Ok(())
}

/// Handles the main watch run
async fn handle_watch(
    config: Config,
    config_hash: &str,
    shadow: bool,
) -> anyhow::Result<()> {
    if shadow {
        tracing::info!("Shadow mode: alerts will not be sent");
    }

    let store = open_store(Path::new(&config.store.database_path))
        .with_context(|| format!("opening store {}", config.store.database_path))?;

    let timeout = Duration::from_secs(config.crawler.request_timeout_secs);
    let proxies = match load_proxies(&config.proxies, timeout).await {
        Ok(proxies) => proxies,
        Err(e) => {
            tracing::warn!("Failed to load proxies, continuing without: {}", e);
            Vec::new()
        }
    };
    tracing::info!("Loaded {} proxies", proxies.len());

    let notifier: Option<Arc<dyn Notifier>> = match &config.notifier {
        Some(notifier_config) => {
            let notifier: Arc<dyn Notifier> = Arc::new(
                TelegramNotifier::new(notifier_config).context("setting up the notifier")?,
            );
            Some(notifier)
        }
        None => None,
    };

    tracing::info!(
        "Sites: {}, Searches: {}",
        config.sites.len(),
        config.searches.len()
    );

    let mut coordinator = Coordinator::new(config, store, proxies)
        .with_shadow(shadow)
        .with_config_hash(config_hash);
    if let Some(notifier) = notifier {
        coordinator = coordinator.with_notifier(notifier);
    }

    let cancel = coordinator.cancel_token();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupted, stopping after the current page");
            cancel.cancel();
        }
    });

    match coordinator.run().await {
        Ok(summary) => {
            tracing::info!(
                "Run {} finished with {} net new listings",
                summary.run_uuid,
                summary.net_new
            );
            Ok(())
        }
        Err(e) => {
            tracing::error!("Run failed: {}", e);
            Err(e.into())
        }
    }
}
