//! Worker configuration.
//!
//! Settings are read from `~/.fleetbench/config.ini`. A missing file yields
//! defaults; command-line flags override individual values afterwards.
//!
//! # Example
//!
//! ```
//! use fleetbench::config::ConfigFile;
//!
//! let config = ConfigFile::default();
//! assert_eq!(config.timing.report_interval_secs, 30);
//! assert_eq!(config.cache.pgn_max_age_days, 1);
//! ```

mod defaults;
mod file;
mod parser;
mod settings;
mod writer;

pub use defaults::*;
pub use file::{config_directory, config_file_path, ConfigFileError};
pub use settings::{
    CacheSettings, ConfigFile, LoggingSettings, MachineSettings, ServerSettings, TimingSettings,
};
