//! CLI runner for common setup.
//!
//! Loads the config file and initializes logging so command handlers
//! start from the same state.

use std::path::{Path, PathBuf};

use fleetbench::config::ConfigFile;
use fleetbench::logging::{init_logging, LoggingGuard};
use tracing::info;

use crate::error::CliError;

/// Runner that manages CLI lifecycle and common operations.
pub struct CliRunner {
    /// Keeps logging active while the runner exists
    #[allow(dead_code)]
    logging_guard: LoggingGuard,
    config: ConfigFile,
    config_path: PathBuf,
}

impl CliRunner {
    /// Loads `config_path` and starts logging to the configured file and
    /// stdout.
    pub fn new(config_path: &Path, verbose: bool) -> Result<Self, CliError> {
        let config = ConfigFile::load_from(config_path)?;

        let logging_guard = init_logging(&config.logging.file, true, verbose)
            .map_err(|e| CliError::LoggingInit(e.to_string()))?;

        Ok(Self {
            logging_guard,
            config,
            config_path: config_path.to_path_buf(),
        })
    }

    pub fn config(&self) -> &ConfigFile {
        &self.config
    }

    /// Log startup information for a command.
    pub fn log_startup(&self, command: &str) {
        info!("Fleetbench v{}", fleetbench::VERSION);
        info!(config = %self.config_path.display(), "fleetbench-worker: {} command", command);
    }
}
