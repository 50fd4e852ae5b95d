//! Fleetbench worker - command-line interface
//!
//! Registers this machine with a fleetbench server and plays engine-testing
//! workloads until interrupted.

mod commands;
mod error;
mod runner;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use fleetbench::config::config_file_path;

use commands::cache::CacheAction;
use commands::config::ConfigCommands;
use commands::run::RunArgs;
use error::CliError;
use runner::CliRunner;

#[derive(Parser)]
#[command(name = "fleetbench-worker")]
#[command(version = fleetbench::VERSION)]
#[command(about = "Distributed engine-testing worker", long_about = None)]
struct Cli {
    /// Config file (default: ~/.fleetbench/config.ini)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Log at debug level unless RUST_LOG is set
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Register with the server and play workloads until stopped
    ///
    /// Stops cleanly on Ctrl-C or when `fleetbench.exit` appears in the
    /// working directory. Exits with an error when the server rejects the
    /// credentials or this client version.
    Run(RunArgs),

    /// Manage the configuration file
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },

    /// Maintain the working directory
    Cache {
        #[command(subcommand)]
        action: CacheAction,
    },
}

fn main() {
    let cli = Cli::parse();
    let config_path = cli.config.clone().unwrap_or_else(config_file_path);

    let result = match cli.command {
        Commands::Run(args) => CliRunner::new(&config_path, cli.verbose)
            .and_then(|runner| commands::run::run(runner, args)),
        Commands::Config { command } => commands::config::run(command, &config_path),
        Commands::Cache { action } => commands::cache::run(action, &config_path),
    };

    if let Err(e) = result {
        e.exit();
    }
}
