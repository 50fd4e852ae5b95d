//! Settings structs for all configuration sections.
//!
//! Each struct represents one `[section]` of the INI config file.

use std::path::PathBuf;

/// Complete worker configuration loaded from config.ini.
#[derive(Debug, Clone, PartialEq)]
pub struct ConfigFile {
    /// `[server]`
    pub server: ServerSettings,
    /// `[worker]`
    pub machine: MachineSettings,
    /// `[timing]`
    pub timing: TimingSettings,
    /// `[cache]`
    pub cache: CacheSettings,
    /// `[logging]`
    pub logging: LoggingSettings,
}

/// Server endpoint and account.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ServerSettings {
    pub url: Option<String>,
    pub username: Option<String>,
    pub password: Option<String>,
}

/// Resources this machine offers.
#[derive(Debug, Clone, PartialEq)]
pub struct MachineSettings {
    /// Threads dedicated to games; all logical CPUs when unset.
    pub threads: Option<u32>,
    /// Match-runner copies, usually the CPU socket count.
    pub sockets: u32,
    /// Pseudonym shown by the server instead of the machine id.
    pub identity: Option<String>,
    /// Syzygy directories, separated by `:` (`;` on Windows).
    pub syzygy_path: Option<String>,
    /// Exit instead of idling when the server has no work.
    pub fleet: bool,
    /// Engines this worker prefers to run, most preferred first.
    pub engine_preferences: Vec<String>,
}

/// Cadences, timeouts and backoffs.
#[derive(Debug, Clone, PartialEq)]
pub struct TimingSettings {
    pub http_timeout_secs: u64,
    /// Delay after an unexpected error before retrying.
    pub error_backoff_secs: u64,
    /// Delay before asking again when no work is available.
    pub workload_backoff_secs: u64,
    /// Minimum spacing of result and heartbeat reports.
    pub report_interval_secs: u64,
    /// Maximum time a bench run may take.
    pub bench_timeout_secs: u64,
    /// Bounded wait of the reporting loop for new batches.
    pub result_poll_ms: u64,
}

/// Working directory layout and age-based eviction.
#[derive(Debug, Clone, PartialEq)]
pub struct CacheSettings {
    /// Holds `Books/`, `Engines/`, `Networks/`, `PGNs/` and `machine.txt`.
    pub directory: PathBuf,
    pub pgn_max_age_days: u64,
    pub engine_max_age_days: u64,
    pub network_max_age_days: u64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct LoggingSettings {
    pub file: PathBuf,
}
