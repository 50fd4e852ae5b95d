//! Worker machines as seen by the scheduler.

use serde::{Deserialize, Serialize};

use crate::workload::WorkloadId;

/// Capability snapshot a worker registers with.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct MachineInfo {
    /// Engines the worker accepts; empty accepts any engine.
    pub supported_engines: Vec<String>,
    /// Largest complete tablebase set available, 0 for none.
    #[serde(default)]
    pub syzygy_max: u8,
    /// Threads the worker dedicates to games.
    pub threads: u32,
    /// Match-runner copies to run, usually one per CPU socket.
    pub sockets: u32,
    pub physical_cores: u32,
    pub logical_cores: u32,
    #[serde(default)]
    pub cpu_flags: Vec<String>,
    #[serde(default)]
    pub cpu_name: String,
    #[serde(default)]
    pub os_name: String,
    /// Optional pseudonym shown instead of the machine id.
    #[serde(default)]
    pub identity: Option<String>,
    /// Previously assigned id, reused across restarts.
    #[serde(default)]
    pub machine_id: Option<u64>,
    pub client_version: u32,
}

impl MachineInfo {
    /// True when game threads exceed physical cores.
    pub fn uses_hyperthreads(&self) -> bool {
        self.physical_cores < self.threads
    }

    pub fn supports(&self, engine: &str) -> bool {
        self.supported_engines.is_empty() || self.supported_engines.iter().any(|e| e == engine)
    }
}

/// A registered machine and its advisory assignment cursor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Machine {
    pub id: u64,
    pub info: MachineInfo,
    /// Workload of the most recent assignment.
    #[serde(default)]
    pub workload: Option<WorkloadId>,
}

impl Machine {
    pub fn new(id: u64, info: MachineInfo) -> Self {
        Self {
            id,
            info,
            workload: None,
        }
    }
}
