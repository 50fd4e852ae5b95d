//! Configuration management CLI commands.
//!
//! Provides `config init`, `config path` and `config show`.

use std::path::Path;

use clap::Subcommand;
use fleetbench::config::ConfigFile;

use crate::error::CliError;

/// Config subcommands.
#[derive(Debug, Subcommand)]
pub enum ConfigCommands {
    /// Write a config file with default settings
    Init {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },

    /// Show the configuration file path
    Path,

    /// Print the effective configuration, password masked
    Show,
}

/// Run a config subcommand against the file at `path`.
pub fn run(command: ConfigCommands, path: &Path) -> Result<(), CliError> {
    match command {
        ConfigCommands::Init { force } => run_init(path, force),
        ConfigCommands::Path => {
            println!("{}", path.display());
            Ok(())
        }
        ConfigCommands::Show => {
            let mut config = ConfigFile::load_from(path)?;
            if config.server.password.is_some() {
                config.server.password = Some("********".to_string());
            }
            print!("{}", config.to_ini_string());
            Ok(())
        }
    }
}

fn run_init(path: &Path, force: bool) -> Result<(), CliError> {
    if path.exists() && !force {
        println!("Config file already exists: {}", path.display());
        println!("Use --force to replace it with defaults.");
        return Ok(());
    }

    ConfigFile::default().save_to(path)?;
    println!("Wrote default configuration to {}", path.display());
    println!("Set url, username and password in the [server] section before running.");
    Ok(())
}
