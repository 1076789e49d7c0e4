//! # nav CLI
//!
//! The `nav` binary runs the navigation-site server and a few maintenance
//! commands against the same on-disk stores.
//!
//! ## Usage
//!
//! ```bash
//! nav --root /srv/nav <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `nav serve` | Start the HTTP server on the configured port |
//! | `nav spider` | Run a liveness crawl and persist the results |
//! | `nav check` | Load every primary store and report problems |
//!
//! Logging is controlled with `RUST_LOG` (default `info`).

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

use nav_server::models::Health;
use nav_server::paths::Paths;
use nav_server::server;
use nav_server::spider::{spider_webs, HttpProbe};
use nav_server::store::{NavStore, Visibility};

/// Self-hosted navigation-site server.
#[derive(Parser)]
#[command(name = "nav", about = "Self-hosted bookmark and navigation-site server", version)]
struct Cli {
    /// Base installation directory holding `data/`, `dist/`, and `nav.config.yaml`.
    #[arg(long, global = true, default_value = ".")]
    root: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

/// Top-level CLI commands.
#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP server.
    ///
    /// Reads the listen port from `nav.config.yaml`; a missing or malformed
    /// config aborts startup.
    Serve {
        /// Override the configured port.
        #[arg(long)]
        port: Option<u16>,
    },

    /// Probe every entry URL and record the results.
    ///
    /// Progress is printed on stderr. The dataset and the error count in
    /// settings are rewritten when the crawl finishes.
    Spider {
        /// Also print progress for login-only entries.
        #[arg(long)]
        login: bool,
    },

    /// Load config, settings, dataset, tags, and search aliases.
    Check,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_target(false)
        .init();

    let cli = Cli::parse();
    let paths = Paths::new(&cli.root)?;

    match cli.command {
        Commands::Serve { port } => server::run_server(paths, port).await?,
        Commands::Spider { login } => run_spider(NavStore::new(paths), login).await?,
        Commands::Check => run_check(NavStore::new(paths)).await?,
    }

    Ok(())
}

async fn run_spider(store: NavStore, login: bool) -> Result<()> {
    let webs = store.read_dataset(Visibility::Unfiltered).await?;
    let mut settings = store.load_settings().await?;
    let probe = HttpProbe::new(Duration::from_secs(settings.spider_timeout.max(1)))
        .context("Failed to build HTTP client")?;

    let outcome = spider_webs(webs, &settings, Arc::new(probe), |batch| {
        for report in batch.iter().filter(|r| login || !r.login_only) {
            let status = match &report.health {
                Health::Ok { code } => format!("ok {}", code),
                Health::Failed { reason } => format!("failed ({})", reason),
                Health::Timeout => "timeout".to_string(),
                Health::Unknown => "unknown".to_string(),
            };
            eprintln!("spider  {}  {}", report.url, status);
        }
    })
    .await;

    store.record_crawl(&outcome, &mut settings).await?;
    println!(
        "spider finished in {}s, {} failing url(s)",
        outcome.elapsed.as_secs(),
        outcome.error_url_count
    );
    Ok(())
}

async fn run_check(store: NavStore) -> Result<()> {
    let config = store.load_config().await?;
    println!("config      ok (port {})", config.port);
    let settings = store.load_settings().await?;
    println!("settings    ok (errorUrlCount {})", settings.error_url_count);
    let webs = store.read_dataset(Visibility::Unfiltered).await?;
    println!("dataset     ok ({} categories)", webs.len());
    let tags = store.read_tags().await?;
    nav_server::transform::validate_tags(&tags)?;
    println!("tags        ok ({})", tags.len());
    let search = store.read_search_aliases().await?;
    println!("search      ok ({})", search.len());
    let collected = store.read_collected().await;
    println!("collected   {} item(s)", collected.len());
    Ok(())
}
