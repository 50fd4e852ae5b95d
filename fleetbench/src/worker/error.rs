//! Worker error taxonomy.
//!
//! Provisioning and bench failures are confined to one workload attempt;
//! protocol failures may unwind further.

use thiserror::Error;

use crate::protocol::ProtocolError;
use crate::workload::Side;

/// Failures while obtaining books, networks and engine binaries.
#[derive(Debug, Error)]
pub enum ProvisionError {
    /// The opening book hash did not match after a fresh download.
    #[error("Invalid SHA-256 for book {name}: expected {expected}, got {actual}")]
    CorruptedBook {
        name: String,
        expected: String,
        actual: String,
    },

    /// Network weights did not match their identifier.
    #[error("Invalid SHA-256 for network {network}: got {actual}")]
    CorruptedNetwork { network: String, actual: String },

    /// The source build exited with an error or produced no binary.
    #[error("Failed to build {engine} ({side})")]
    BuildFailed {
        side: Side,
        engine: String,
        output: String,
    },

    /// No pre-built artifact suits this machine.
    #[error("No suitable artifact for {engine} ({side}) among {available:?}")]
    MissingArtifact {
        side: Side,
        engine: String,
        available: Vec<String>,
    },

    /// Private engines need a `credentials.<engine>` token file.
    #[error("Missing credentials file {0}")]
    MissingCredentials(String),

    /// Archive could not be read or extracted.
    #[error("Invalid archive: {0}")]
    Archive(String),

    #[error("Download failed: {0}")]
    Http(#[from] ProtocolError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl ProvisionError {
    /// Side of the match the failure belongs to, when known.
    pub fn side(&self) -> Option<Side> {
        match self {
            ProvisionError::BuildFailed { side, .. } | ProvisionError::MissingArtifact { side, .. } => Some(*side),
            _ => None,
        }
    }
}

impl From<zip::result::ZipError> for ProvisionError {
    fn from(e: zip::result::ZipError) -> Self {
        ProvisionError::Archive(e.to_string())
    }
}

/// Failures verifying an engine with its bench command.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum BenchError {
    /// Parallel runs reported different node counts.
    #[error("Non-deterministic bench: {observed:?}")]
    NonDeterministic { observed: Vec<u64> },

    /// The node count differs from the one the server expects.
    #[error("Wrong bench: expected {expected}, got {observed}")]
    WrongBench { expected: u64, observed: u64 },

    /// Not every run finished within the allowed time.
    #[error("Bench did not finish within {0} seconds")]
    Timeout(u64),

    /// The engine could not be started or printed no bench.
    #[error("Bench failed to execute: {0}")]
    FailedToExecute(String),
}

impl BenchError {
    /// Node count worth reporting as a bad bench, if any.
    pub fn observed_bench(&self) -> Option<u64> {
        match self {
            BenchError::WrongBench { observed, .. } => Some(*observed),
            BenchError::NonDeterministic { .. } => Some(0),
            _ => None,
        }
    }
}

/// Any failure of the worker.
#[derive(Debug, Error)]
pub enum WorkerError {
    #[error(transparent)]
    Provision(#[from] ProvisionError),

    #[error("{side} bench: {source}")]
    Bench {
        side: Side,
        #[source]
        source: BenchError,
    },

    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// A match runner could not be launched.
    #[error("Failed to launch match runner {runner}: {source}")]
    RunnerLaunch {
        runner: usize,
        #[source]
        source: std::io::Error,
    },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl WorkerError {
    /// Whether the error only ends the current workload attempt.
    ///
    /// Attempt-local failures blacklist the workload for this session and
    /// the worker asks for new work. Credential and version rejections
    /// must unwind to the caller.
    pub fn is_attempt_local(&self) -> bool {
        match self {
            WorkerError::Provision(_) | WorkerError::Bench { .. } | WorkerError::RunnerLaunch { .. } => true,
            WorkerError::Protocol(e) => e.is_transient(),
            WorkerError::Io(_) => false,
        }
    }

    /// Whether the process must stop instead of retrying.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            WorkerError::Protocol(ProtocolError::BadCredentials | ProtocolError::BadClientVersion)
        )
    }
}
