//! Capability and capacity filters over candidate workloads.

use tracing::trace;

use super::distribution::WorkerDistribution;
use super::machine::MachineInfo;
use crate::workload::{Workload, WorkloadId, WorkloadStatus};

/// Whether `machine` can play `workload` with its declared threads.
///
/// Thread-odds workloads are refused on hyperthreaded machines since the
/// shared cores skew the speed of the side with more threads. SPSA plays a
/// whole pair at once, so it needs room for two games.
pub fn is_valid_assignment(machine: &MachineInfo, workload: &Workload) -> bool {
    if workload.has_thread_odds() && machine.uses_hyperthreads() {
        return false;
    }

    let games_at_once = if workload.mode.is_spsa() { 2 } else { 1 };
    games_at_once * workload.max_engine_threads() <= machine.threads
}

fn below_ceilings(workload: &Workload, distribution: &WorkerDistribution) -> bool {
    let load = distribution.load(workload.id);
    let workers_ok = workload.max_workers.map_or(true, |max| load.workers < max);
    let threads_ok = workload.max_threads.map_or(true, |max| load.threads < max);
    workers_ok && threads_ok
}

/// Keeps the workloads `machine` may be assigned, restricted to the
/// highest priority among them.
pub fn filter_candidates<'a>(
    machine: &MachineInfo,
    candidates: &'a [Workload],
    distribution: &WorkerDistribution,
    blacklist: &[WorkloadId],
) -> Vec<&'a Workload> {
    let survivors: Vec<&Workload> = candidates
        .iter()
        .filter(|w| w.status == WorkloadStatus::Active)
        .filter(|w| !blacklist.contains(&w.id))
        .filter(|w| machine.supports(&w.dev.engine) && machine.supports(&w.base.engine))
        .filter(|w| w.adjudication.required_pieces() <= machine.syzygy_max)
        .filter(|w| is_valid_assignment(machine, w))
        .filter(|w| below_ceilings(w, distribution))
        .collect();

    let Some(highest) = survivors.iter().map(|w| w.priority).max() else {
        return Vec::new();
    };

    let filtered: Vec<&Workload> = survivors.into_iter().filter(|w| w.priority == highest).collect();
    trace!(candidates = candidates.len(), survivors = filtered.len(), priority = highest, "Filtered workloads");
    filtered
}
