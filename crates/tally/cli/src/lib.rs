//! Tally CLI - replay ledger scenarios through the transaction lifecycle
//!
//! - `run`: build a genesis ledger from a TOML scenario, run each
//!   transaction through prologue, body and epilogue, and report the result
//! - `derive`: show the authentication key and address a pre-image maps to

use std::ffi::OsString;
use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod commands;
mod error;
mod output;
mod scenario;

pub use error::{CliError, CliResult};

/// Tally CLI application
#[derive(Parser)]
#[command(name = "tally")]
#[command(about = "Tally - account ledger and transaction lifecycle", long_about = None)]
#[command(version)]
struct Cli {
    /// Output format (text, json)
    #[arg(short, long, default_value = "text")]
    output: output::OutputFormat,

    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Available commands
#[derive(Subcommand)]
enum Commands {
    /// Replay a scenario file
    Run {
        /// Scenario TOML file
        scenario: PathBuf,

        /// Lifecycle config TOML; overrides the scenario's [lifecycle] table
        #[arg(short, long)]
        config: Option<PathBuf>,
    },

    /// Derive the authentication key and address of a hex pre-image
    Derive {
        /// Hex-encoded pre-image
        preimage: String,
    },
}

/// Run using the current process arguments.
pub fn run() -> anyhow::Result<()> {
    run_with_args(std::env::args_os())
}

/// Run using the provided argument iterator.
pub fn run_with_args<I, T>(args: I) -> anyhow::Result<()>
where
    I: IntoIterator<Item = T>,
    T: Into<OsString> + Clone,
{
    let cli = Cli::parse_from(args);

    let filter = if cli.verbose { "debug" } else { "warn" };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| filter.into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr).without_time())
        .init();

    match cli.command {
        Commands::Run { scenario, config } => {
            commands::run::execute(&scenario, config.as_deref(), cli.output)
                .with_context(|| format!("running scenario {}", scenario.display()))
        }
        Commands::Derive { preimage } => {
            commands::derive::execute(&preimage, cli.output).context("deriving address")
        }
    }
}
