//! CLI error handling with user-friendly messages.
//!
//! Centralizes error handling for the CLI, providing consistent formatting
//! and appropriate exit codes.

use std::process;

use fleetbench::config::ConfigFileError;
use fleetbench::protocol::ProtocolError;
use fleetbench::worker::WorkerError;
use thiserror::Error;

/// CLI-specific errors with user-friendly messages.
#[derive(Debug, Error)]
pub enum CliError {
    #[error("Failed to initialize logging: {0}")]
    LoggingInit(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Failed to start async runtime: {0}")]
    Runtime(std::io::Error),

    #[error("Failed to create server client: {0}")]
    Client(ProtocolError),

    #[error(transparent)]
    Worker(#[from] WorkerError),
}

impl CliError {
    /// Exit the process with an appropriate error message and code.
    pub fn exit(&self) -> ! {
        eprintln!("Error: {}", self);

        match self {
            CliError::Worker(WorkerError::Protocol(ProtocolError::BadCredentials)) => {
                eprintln!();
                eprintln!("Check the username and password in config.ini, or set");
                eprintln!("FLEETBENCH_USERNAME and FLEETBENCH_PASSWORD.");
            }
            CliError::Worker(WorkerError::Protocol(ProtocolError::BadClientVersion)) => {
                eprintln!();
                eprintln!("This worker is older than the server accepts.");
                eprintln!("Update fleetbench-worker and start it again.");
            }
            CliError::Config(_) => {
                eprintln!();
                eprintln!("Run `fleetbench-worker config init` to create a config file,");
                eprintln!("then edit the [server] section.");
            }
            _ => {}
        }

        process::exit(1)
    }
}

impl From<ConfigFileError> for CliError {
    fn from(e: ConfigFileError) -> Self {
        CliError::Config(e.to_string())
    }
}
