//! Undetermini CLI: benchmark nondeterministic implementations from the terminal.
//!
//! Runs the built-in demo benchmark and inspects the result store.

mod commands;
mod demo;
mod table;

use clap::Parser;
use std::path::PathBuf;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

/// Undetermini: compare nondeterministic implementations on accuracy, latency and cost
#[derive(Parser, Debug)]
#[command(name = "undetermini", version, about, long_about = None)]
struct Cli {
    /// Workspace directory
    #[arg(short, long, default_value = ".")]
    workspace: PathBuf,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-essential output
    #[arg(short, long)]
    quiet: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(clap::Subcommand, Debug)]
pub(crate) enum Commands {
    /// Run the built-in candidate extraction benchmark
    Demo {
        /// Runs per implementation
        #[arg(short, long)]
        times: Option<usize>,

        /// Reuse stored runs for identical implementation and input
        #[arg(long)]
        use_cache: bool,

        /// Persist runs to the store file
        #[arg(long)]
        persist: bool,

        /// Store file path
        #[arg(long)]
        store: Option<PathBuf>,
    },
    /// Inspect the result store
    Store {
        #[command(subcommand)]
        action: StoreAction,
    },
    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(clap::Subcommand, Debug)]
pub(crate) enum StoreAction {
    /// Summarize the stored runs
    Stats,
    /// Print the most recent records for a run id
    Show {
        /// Run id (hash of implementation and input)
        run_id: String,

        /// Number of records to print
        #[arg(short = 'n', long, default_value = "10")]
        limit: usize,
    },
}

#[derive(clap::Subcommand, Debug)]
pub(crate) enum ConfigAction {
    /// Create a default workspace configuration file
    Init,
    /// Print the effective configuration
    Show,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file if present
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();

    // Set up tracing: human-readable stderr + JSON file logging
    let filter = match cli.verbose {
        0 if cli.quiet => "error",
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };

    let stderr_layer = tracing_subscriber::fmt::layer()
        .with_target(false)
        .with_writer(std::io::stderr)
        .with_filter(EnvFilter::new(filter));

    let log_dir = directories::ProjectDirs::from("dev", "undetermini", "undetermini")
        .map(|d| d.data_dir().join("logs"))
        .unwrap_or_else(|| PathBuf::from("."));
    let _ = std::fs::create_dir_all(&log_dir);
    let file_appender = tracing_appender::rolling::daily(&log_dir, "undetermini.log");
    let (non_blocking, _guard) = tracing_appender::non_blocking(file_appender);
    let json_layer = tracing_subscriber::fmt::layer()
        .json()
        .with_writer(non_blocking)
        .with_filter(EnvFilter::new("debug"));

    tracing_subscriber::registry()
        .with(stderr_layer)
        .with(json_layer)
        .init();

    let workspace = cli
        .workspace
        .canonicalize()
        .unwrap_or_else(|_| std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")));

    commands::handle_command(cli.command, &workspace).await
}
