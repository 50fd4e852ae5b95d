//! Fleet-wide attention per workload.

use std::collections::HashMap;

use super::machine::Machine;
use crate::workload::{Workload, WorkloadId};

/// Machines and threads currently working one workload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct WorkloadLoad {
    pub workers: u32,
    pub threads: u32,
}

/// Load of every active workload, excluding the requesting machine.
#[derive(Debug, Clone, Default)]
pub struct WorkerDistribution {
    loads: HashMap<WorkloadId, WorkloadLoad>,
}

impl WorkerDistribution {
    /// Counts recently seen machines by the workload they report working on.
    ///
    /// Only workloads in `active` appear in the distribution, and the
    /// machine identified by `requester` is never counted.
    pub fn build(active: &[Workload], recent: &[Machine], requester: u64) -> Self {
        let mut loads: HashMap<WorkloadId, WorkloadLoad> =
            active.iter().map(|w| (w.id, WorkloadLoad::default())).collect();

        for machine in recent.iter().filter(|m| m.id != requester) {
            let Some(workload) = machine.workload else { continue };
            if let Some(load) = loads.get_mut(&workload) {
                load.workers += 1;
                load.threads += machine.info.threads;
            }
        }

        Self { loads }
    }

    pub fn load(&self, workload: WorkloadId) -> WorkloadLoad {
        self.loads.get(&workload).copied().unwrap_or_default()
    }

    pub fn contains(&self, workload: WorkloadId) -> bool {
        self.loads.contains_key(&workload)
    }
}
