//! Runtime settings of a worker, built once at startup.

use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::config::{num_cpus, CacheSettings, ConfigFile, TimingSettings};

/// Marker file whose presence asks the worker to exit cleanly.
pub const EXIT_FILE: &str = "fleetbench.exit";

/// File holding the machine id assigned by the server.
pub const MACHINE_FILE: &str = "machine.txt";

/// Everything the worker needs, merged from the config file and the
/// command line. Passed by reference; there is no global state.
#[derive(Debug, Clone, PartialEq)]
pub struct WorkerSettings {
    pub server_url: String,
    pub username: String,
    pub password: String,
    /// Threads dedicated to games.
    pub threads: u32,
    pub sockets: u32,
    pub identity: Option<String>,
    pub syzygy_path: Option<String>,
    pub fleet: bool,
    pub engine_preferences: Vec<String>,
    pub timing: TimingSettings,
    pub cache: CacheSettings,
}

impl WorkerSettings {
    /// Takes every value from `config`; credentials may still be empty.
    pub fn from_config(config: &ConfigFile) -> Self {
        Self {
            server_url: config.server.url.clone().unwrap_or_default(),
            username: config.server.username.clone().unwrap_or_default(),
            password: config.server.password.clone().unwrap_or_default(),
            threads: config.machine.threads.unwrap_or_else(|| num_cpus() as u32),
            sockets: config.machine.sockets,
            identity: config.machine.identity.clone(),
            syzygy_path: config.machine.syzygy_path.clone(),
            fleet: config.machine.fleet,
            engine_preferences: config.machine.engine_preferences.clone(),
            timing: config.timing.clone(),
            cache: config.cache.clone(),
        }
    }

    pub fn work_dirs(&self) -> WorkDirs {
        WorkDirs::new(&self.cache.directory)
    }

    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.timing.http_timeout_secs)
    }

    pub fn error_backoff(&self) -> Duration {
        Duration::from_secs(self.timing.error_backoff_secs)
    }

    pub fn workload_backoff(&self) -> Duration {
        Duration::from_secs(self.timing.workload_backoff_secs)
    }

    pub fn report_interval(&self) -> Duration {
        Duration::from_secs(self.timing.report_interval_secs)
    }

    pub fn bench_timeout(&self) -> Duration {
        Duration::from_secs(self.timing.bench_timeout_secs)
    }

    pub fn result_poll(&self) -> Duration {
        Duration::from_millis(self.timing.result_poll_ms)
    }
}

/// Layout of the worker's working directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkDirs {
    root: PathBuf,
}

impl WorkDirs {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn books(&self) -> PathBuf {
        self.root.join("Books")
    }

    pub fn engines(&self) -> PathBuf {
        self.root.join("Engines")
    }

    pub fn networks(&self) -> PathBuf {
        self.root.join("Networks")
    }

    pub fn pgns(&self) -> PathBuf {
        self.root.join("PGNs")
    }

    /// Scratch space for source builds and artifact extraction.
    pub fn scratch(&self) -> PathBuf {
        self.root.join("tmp")
    }

    pub fn machine_file(&self) -> PathBuf {
        self.root.join(MACHINE_FILE)
    }

    pub fn exit_file(&self) -> PathBuf {
        self.root.join(EXIT_FILE)
    }

    /// Token file of a private engine: `credentials.<engine>`, lowercase
    /// and without spaces.
    pub fn credentials_file(&self, engine: &str) -> PathBuf {
        let name: String = engine.chars().filter(|c| !c.is_whitespace()).collect();
        self.root.join(format!("credentials.{}", name.to_lowercase()))
    }

    /// Creates every cache directory.
    pub fn create_all(&self) -> std::io::Result<()> {
        for dir in [self.books(), self.engines(), self.networks(), self.pgns()] {
            std::fs::create_dir_all(dir)?;
        }
        Ok(())
    }

    pub fn exit_requested(&self) -> bool {
        self.exit_file().exists()
    }
}
