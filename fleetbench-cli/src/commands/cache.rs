//! Cache management CLI commands.

use std::path::Path;

use clap::Subcommand;
use fleetbench::config::ConfigFile;
use fleetbench::worker::{evict_stale_files, WorkerSettings};

use crate::error::CliError;

/// Cache action subcommands.
#[derive(Debug, Subcommand)]
pub enum CacheAction {
    /// Delete PGNs, engines and networks older than their configured age
    Evict,
    /// Show the working directory
    Path,
}

/// Run a cache subcommand.
pub fn run(action: CacheAction, config_path: &Path) -> Result<(), CliError> {
    let config = ConfigFile::load_from(config_path)?;
    let settings = WorkerSettings::from_config(&config);
    let dirs = settings.work_dirs();

    match action {
        CacheAction::Evict => {
            println!("Evicting stale files under: {}", dirs.root().display());
            let result = evict_stale_files(&dirs, &settings.cache);
            println!(
                "Deleted {} files ({} PGNs, {} engines, {} networks)",
                result.total(),
                result.pgns,
                result.engines,
                result.networks
            );
        }
        CacheAction::Path => println!("{}", dirs.root().display()),
    }
    Ok(())
}
