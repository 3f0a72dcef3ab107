//! Retain Daemon - keeps a memory store alive and runs periodic maintenance

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tokio::signal;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use retain::config::Config;
use retain::error::Result;
use retain::storage::{MaintenanceReport, MemoryStore};

/// Retain - tiered memory store with consolidation and decay
#[derive(Parser)]
#[command(name = "retain")]
#[command(about = "A tiered memory store with consolidation, decay and durable snapshots")]
#[command(version)]
pub struct Cli {
    /// Path to config file
    #[arg(long, short = 'c', global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand)]
pub enum Command {
    /// Run maintenance on a schedule until interrupted (default command)
    #[command(name = "serve")]
    Serve {
        /// Run a single maintenance pass and exit
        #[arg(long)]
        once: bool,
    },
}

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    init_logging();

    let cli = Cli::parse();

    match cli.command {
        None => serve(cli.config, false).await,
        Some(Command::Serve { once }) => serve(cli.config, once).await,
    }
}

fn init_logging() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info,retain=debug"));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}

async fn serve(config_path: Option<PathBuf>, once: bool) -> Result<()> {
    tracing::info!("Starting Retain daemon");

    let config = Config::load(config_path.as_deref())?;
    tracing::debug!("Config loaded: {:?}", config);

    tracing::info!(
        "Opening memory store at: {}",
        config.storage.snapshot_path().display()
    );
    let store = MemoryStore::open(&config).await?;
    let stats = store.stats().await;
    tracing::info!(
        working = stats.working_count,
        short_term = stats.short_term_count,
        long_term = stats.long_term_count,
        "Memory store ready"
    );

    if once {
        log_report(&store.run_maintenance().await);
        store.shutdown().await?;
        return Ok(());
    }

    let mut ticker = tokio::time::interval(config.maintenance.interval());
    // The first tick completes immediately; skip it so a restart does not
    // double up with the pass that ran just before shutdown.
    ticker.tick().await;

    let shutdown = shutdown_signal();
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            _ = ticker.tick() => log_report(&store.run_maintenance().await),
            _ = &mut shutdown => break,
        }
    }

    store.shutdown().await?;
    tracing::info!("Retain daemon stopped");
    Ok(())
}

fn log_report(report: &MaintenanceReport) {
    if report.is_empty() {
        tracing::debug!("Maintenance pass made no changes");
    } else {
        tracing::info!(
            promoted = report.promoted.len(),
            forgotten = report.forgotten.len(),
            "Maintenance pass complete"
        );
    }
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM)
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {e}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C, flushing and shutting down");
        },
        _ = terminate => {
            tracing::info!("Received SIGTERM, flushing and shutting down");
        },
    }
}
