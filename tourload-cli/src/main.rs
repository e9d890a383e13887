use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

mod cli;
mod commands;
mod config;

#[derive(Parser)]
#[command(name = "tourload")]
#[command(about = "Tourload - seed, load and verify a synthetic tour booking dataset")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(author = "Tourload Team")]
struct Cli {
    /// Configuration file path
    #[arg(short, long, value_name = "FILE", global = true)]
    config: Option<PathBuf>,

    /// Verbose output (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Quiet mode (suppress progress and logging)
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Output format
    #[arg(long, value_enum, default_value = "table", global = true)]
    format: cli::OutputFormat,

    #[command(flatten)]
    overrides: cli::Overrides,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Print the counts derived from the scale parameters
    Scale,
    /// Seed the dataset and write it to a snapshot
    Load {
        /// Load a single table into the existing snapshot
        #[arg(long, value_enum)]
        only: Option<cli::TableSelection>,
        /// Snapshot file path
        #[arg(long, value_name = "FILE")]
        snapshot: Option<PathBuf>,
    },
    /// Verify a snapshot against the scale model
    Verify {
        /// Snapshot file path
        #[arg(long, value_name = "FILE")]
        snapshot: Option<PathBuf>,
        /// Overwrite one tour's `createdAt` and look it up through the index
        #[arg(long)]
        probe_date_index: bool,
        /// Run the table batteries one after another
        #[arg(long)]
        sequential: bool,
    },
    /// Load and verify in one process
    Run {
        /// Also write the loaded dataset to this snapshot
        #[arg(long, value_name = "FILE")]
        snapshot: Option<PathBuf>,
        /// Overwrite one tour's `createdAt` and look it up through the index
        #[arg(long)]
        probe_date_index: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging based on verbosity
    let log_level = match (cli.quiet, cli.verbose) {
        (true, _) => "error",
        (false, 0) => "warn",
        (false, 1) => "info",
        (false, 2) => "debug",
        (false, _) => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    info!("Starting tourload v{}", env!("CARGO_PKG_VERSION"));

    let result = run(cli).await;
    if let Err(err) = &result {
        match commands::classify_failure(err) {
            Some((category, true)) => error!(%category, "run aborted"),
            Some((category, false)) => warn!(%category, "run finished with failures"),
            None => error!("run aborted"),
        }
    }
    result
}

async fn run(cli: Cli) -> Result<()> {
    // Load configuration, then apply flag and environment overrides
    let file_config = config::Config::load(cli.config)?;
    if !file_config.output.colors {
        colored::control::set_override(false);
    }
    let mut dataset = file_config.dataset;
    cli.overrides.apply(&mut dataset);
    let snapshot_or_default =
        |snapshot: Option<PathBuf>| snapshot.unwrap_or_else(|| file_config.output.snapshot.clone());

    match cli.command {
        Commands::Scale => commands::scale::handle_scale_command(&dataset, cli.format),
        Commands::Load { only, snapshot } => {
            commands::load::handle_load_command(
                &dataset,
                only,
                &snapshot_or_default(snapshot),
                cli.format,
                cli.quiet,
            )
            .await
        }
        Commands::Verify {
            snapshot,
            probe_date_index,
            sequential,
        } => {
            dataset.verify.probe_date_index |= probe_date_index;
            if sequential {
                dataset.verify.concurrent = false;
            }
            commands::verify::handle_verify_command(
                &dataset,
                &snapshot_or_default(snapshot),
                cli.format,
            )
            .await
        }
        Commands::Run {
            snapshot,
            probe_date_index,
        } => {
            dataset.verify.probe_date_index |= probe_date_index;
            commands::verify::handle_run_command(
                &dataset,
                snapshot.as_deref(),
                cli.format,
                cli.quiet,
            )
            .await
        }
    }
}
