use std::path::PathBuf;

use clap::{Parser, Subcommand};
use retain::MemoryStore;
use retain::config::Config;
use retain_cli::commands::{
    ConfigCommand, MaintainCommand, MemoryCommand, SearchCommand, StatsCommand,
};
use retain_cli::error::CliResult;
use retain_cli::output::OutputFormat;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "retain-cli")]
#[command(about = "Retain CLI - inspect and manage a Retain memory store")]
#[command(version)]
pub struct Cli {
    #[clap(long, short, global = true, help = "Output in JSON format")]
    pub json: bool,

    #[clap(long, short = 'd', global = true, help = "Path to data directory")]
    pub data_dir: Option<PathBuf>,

    #[clap(long, short = 'c', global = true, help = "Path to config file")]
    pub config: Option<PathBuf>,

    #[clap(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    #[clap(about = "Memory management commands")]
    Memory(MemoryCommand),

    #[clap(about = "Search memories by tags, importance and creation time")]
    Search(SearchCommand),

    #[clap(about = "Show per-tier counts")]
    Stats(StatsCommand),

    #[clap(about = "Run consolidation and decay")]
    Maintain(MaintainCommand),

    #[clap(about = "Configuration commands")]
    Config(ConfigCommand),
}

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}

fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

async fn run() -> CliResult<()> {
    init_logging();

    let cli = Cli::parse();

    let format = if cli.json {
        OutputFormat::Json
    } else {
        OutputFormat::Table
    };

    let source = Config::locate(cli.config.as_deref());
    let mut config = Config::load(source.as_deref())?;
    if let Some(ref data_dir) = cli.data_dir {
        config.storage.data_dir = data_dir.clone();
    }
    // Each invocation is short-lived; write once at exit instead of debouncing.
    config.storage.debounce_ms = 0;

    if let Command::Config(cmd) = &cli.command {
        return cmd.execute(&config, source.as_deref(), format);
    }

    let store = MemoryStore::open(&config).await?;

    let result = match &cli.command {
        Command::Memory(cmd) => cmd.execute(&store, &config, format).await,
        Command::Search(cmd) => cmd.execute(&store, format).await,
        Command::Stats(cmd) => cmd.execute(&store, format).await,
        Command::Maintain(cmd) => cmd.execute(&store, format).await,
        Command::Config(_) => Ok(()),
    };

    let closed = store.shutdown().await;
    finish(result, closed.map_err(Into::into))
}

/// The command's own error wins; a failed final write is still reported.
fn finish(result: CliResult<()>, closed: CliResult<()>) -> CliResult<()> {
    match (result, closed) {
        (Err(e), Err(write_err)) => {
            eprintln!("Error: failed to save memory store: {write_err}");
            Err(e)
        }
        (Err(e), Ok(())) => Err(e),
        (Ok(()), closed) => closed,
    }
}
