//! Default values and constants for all configuration settings.

use std::path::PathBuf;

use super::file::config_directory;
use super::settings::*;

// =============================================================================
// CPU helpers
// =============================================================================

/// Get the number of available CPU cores.
pub fn num_cpus() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(4)
}

// =============================================================================
// Timing defaults
// =============================================================================

pub const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_ERROR_BACKOFF_SECS: u64 = 10;
pub const DEFAULT_WORKLOAD_BACKOFF_SECS: u64 = 30;
pub const DEFAULT_REPORT_INTERVAL_SECS: u64 = 30;
pub const DEFAULT_BENCH_TIMEOUT_SECS: u64 = 60;
pub const DEFAULT_RESULT_POLL_MS: u64 = 5000;

// =============================================================================
// Cache defaults
// =============================================================================

pub const DEFAULT_PGN_MAX_AGE_DAYS: u64 = 1;
pub const DEFAULT_ENGINE_MAX_AGE_DAYS: u64 = 7;
pub const DEFAULT_NETWORK_MAX_AGE_DAYS: u64 = 28;

/// Default working directory (~/.fleetbench/work).
pub fn default_work_directory() -> PathBuf {
    config_directory().join("work")
}

/// Default log file (~/.fleetbench/fleetbench.log).
pub fn default_log_file() -> PathBuf {
    config_directory().join("fleetbench.log")
}

impl Default for ConfigFile {
    fn default() -> Self {
        Self {
            server: ServerSettings::default(),
            machine: MachineSettings::default(),
            timing: TimingSettings::default(),
            cache: CacheSettings::default(),
            logging: LoggingSettings::default(),
        }
    }
}

impl Default for MachineSettings {
    fn default() -> Self {
        Self {
            threads: None,
            sockets: 1,
            identity: None,
            syzygy_path: None,
            fleet: false,
            engine_preferences: Vec::new(),
        }
    }
}

impl Default for TimingSettings {
    fn default() -> Self {
        Self {
            http_timeout_secs: DEFAULT_HTTP_TIMEOUT_SECS,
            error_backoff_secs: DEFAULT_ERROR_BACKOFF_SECS,
            workload_backoff_secs: DEFAULT_WORKLOAD_BACKOFF_SECS,
            report_interval_secs: DEFAULT_REPORT_INTERVAL_SECS,
            bench_timeout_secs: DEFAULT_BENCH_TIMEOUT_SECS,
            result_poll_ms: DEFAULT_RESULT_POLL_MS,
        }
    }
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            directory: default_work_directory(),
            pgn_max_age_days: DEFAULT_PGN_MAX_AGE_DAYS,
            engine_max_age_days: DEFAULT_ENGINE_MAX_AGE_DAYS,
            network_max_age_days: DEFAULT_NETWORK_MAX_AGE_DAYS,
        }
    }
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            file: default_log_file(),
        }
    }
}
