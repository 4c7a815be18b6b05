//! Scanner Bootstrap CLI - provision and inspect the artifact cache
//!
//! Exit codes: `0` when an executable was resolved (or the cache entry is a
//! hit), `1` when nothing was resolved, `2` on configuration errors.

mod commands;
mod error;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};

use commands::inspect::InspectArgs;
use commands::provision::ProvisionArgs;
use error::CliError;

#[derive(Debug, Parser)]
#[command(name = "scanner-bootstrap")]
#[command(version, about = "Provision the scanner JRE and analysis engine", long_about = None)]
struct Cli {
    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Also write logs to a file in this directory
    #[arg(long, global = true)]
    log_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Resolve an artifact, downloading it into the cache if needed
    Provision(ProvisionArgs),

    /// Check whether an artifact is cached
    Inspect(InspectArgs),
}

fn run(command: Commands) -> Result<bool, CliError> {
    match command {
        Commands::Provision(args) => commands::provision::run(args),
        Commands::Inspect(args) => Ok(commands::inspect::run(args)),
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    let _guard = scanner_bootstrap::logging::init(cli.verbose, cli.log_dir.as_deref());

    match run(cli.command) {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(e) => {
            eprintln!("Error: {}", e);
            e.exit_code()
        }
    }
}
