//! Process-wide worker state, built once at startup.

use tracing::info;

use super::settings::{WorkDirs, WorkerSettings};
use super::system::{detect_cpu, detect_syzygy_max, os_name, CpuInfo};
use crate::protocol::CLIENT_VERSION;
use crate::scheduler::MachineInfo;

/// Settings plus what was detected about this machine.
#[derive(Debug, Clone)]
pub struct WorkerContext {
    pub settings: WorkerSettings,
    pub dirs: WorkDirs,
    pub cpu: CpuInfo,
    /// Largest complete tablebase set under the configured paths.
    pub syzygy_max: u8,
}

impl WorkerContext {
    pub fn new(settings: WorkerSettings, cpu: CpuInfo, syzygy_max: u8) -> Self {
        Self {
            dirs: settings.work_dirs(),
            settings,
            cpu,
            syzygy_max,
        }
    }

    /// Detects the CPU and tablebases of this machine.
    pub fn detect(settings: WorkerSettings) -> Self {
        let cpu = detect_cpu();
        let syzygy_max = settings
            .syzygy_path
            .as_deref()
            .map(detect_syzygy_max)
            .unwrap_or(0);
        info!(syzygy_max, "Detected tablebases");
        Self::new(settings, cpu, syzygy_max)
    }

    /// Capability snapshot sent on registration.
    pub fn machine_info(&self, machine_id: Option<u64>) -> MachineInfo {
        MachineInfo {
            supported_engines: self.settings.engine_preferences.clone(),
            syzygy_max: self.syzygy_max,
            threads: self.settings.threads,
            sockets: self.settings.sockets,
            physical_cores: self.cpu.physical_cores,
            logical_cores: self.cpu.logical_cores,
            cpu_flags: self.cpu.flags.clone(),
            cpu_name: self.cpu.name.clone(),
            os_name: os_name().to_string(),
            identity: self.settings.identity.clone(),
            machine_id,
            client_version: CLIENT_VERSION,
        }
    }
}
