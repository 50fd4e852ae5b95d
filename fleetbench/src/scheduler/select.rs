//! Workload selection.

use rand::seq::SliceRandom;
use rand::Rng;
use tracing::debug;

use super::assign::{build_assignment, Assignment};
use super::distribution::WorkerDistribution;
use super::filter::filter_candidates;
use super::machine::Machine;
use crate::workload::{ResultRecord, Workload, WorkloadId};

/// Share of the fair ratio above which a machine keeps its previous workload.
pub const DEFAULT_STICKINESS_THRESHOLD: f64 = 0.75;

/// Proportional-fair workload selector.
///
/// Each surviving candidate has a ratio of assigned threads to throughput
/// weight. The machine is given one of the least-served candidates, unless
/// the pool is already close enough to fair that staying on its previous
/// workload costs little. Staying avoids rebuilding engines and restarting
/// match runners.
#[derive(Debug, Clone)]
pub struct Scheduler {
    stickiness_threshold: f64,
}

impl Default for Scheduler {
    fn default() -> Self {
        Self::new(DEFAULT_STICKINESS_THRESHOLD)
    }
}

impl Scheduler {
    pub fn new(stickiness_threshold: f64) -> Self {
        Self {
            stickiness_threshold,
        }
    }

    pub fn stickiness_threshold(&self) -> f64 {
        self.stickiness_threshold
    }

    /// Picks a workload for `machine`, or `None` when nothing is eligible.
    pub fn select_workload<'a, R: Rng + ?Sized>(
        &self,
        machine: &Machine,
        candidates: &'a [Workload],
        distribution: &WorkerDistribution,
        blacklist: &[WorkloadId],
        rng: &mut R,
    ) -> Option<&'a Workload> {
        let tests = filter_candidates(&machine.info, candidates, distribution, blacklist);
        if tests.is_empty() {
            return None;
        }

        let ratio = |w: &Workload| distribution.load(w.id).threads as f64 / w.throughput.max(1) as f64;
        let ratios: Vec<f64> = tests.iter().map(|w| ratio(*w)).collect();
        let min_ratio = ratios.iter().copied().fold(f64::INFINITY, f64::min);

        let lowest: Vec<&Workload> = tests
            .iter()
            .zip(&ratios)
            .filter(|(_, &r)| r == min_ratio)
            .map(|(w, _)| *w)
            .collect();

        let previous = machine.workload.filter(|id| distribution.contains(*id));
        let Some(previous) = previous else {
            return lowest.choose(rng).copied();
        };
        if min_ratio == 0.0 {
            return lowest.choose(rng).copied();
        }

        let total_threads: f64 = tests.iter().map(|w| distribution.load(w.id).threads as f64).sum();
        let total_throughput: f64 = tests.iter().map(|w| w.throughput.max(1) as f64).sum();
        let fair_ratio = total_threads / total_throughput;

        if min_ratio / fair_ratio > self.stickiness_threshold {
            if let Some(same) = tests.iter().find(|w| w.id == previous) {
                debug!(machine_id = machine.id, workload_id = previous, "Keeping previous workload");
                return Some(*same);
            }
        }

        lowest.choose(rng).copied()
    }

    /// Full request handling: select, record the assignment and build its payload.
    ///
    /// `recent` holds the recently active machines used for the distribution
    /// snapshot. The machine's assignment cursor is updated and a result
    /// record is created on first assignment.
    #[allow(clippy::too_many_arguments)]
    pub fn assign<R: Rng + ?Sized>(
        &self,
        machine: &mut Machine,
        workloads: &mut [Workload],
        recent: &[Machine],
        records: &mut Vec<ResultRecord>,
        blacklist: &[WorkloadId],
        rng: &mut R,
    ) -> Option<Assignment> {
        let distribution = WorkerDistribution::build(workloads, recent, machine.id);
        let workload_id = self
            .select_workload(machine, workloads, &distribution, blacklist, rng)?
            .id;
        let workload = workloads.iter_mut().find(|w| w.id == workload_id)?;

        let record_index = match records
            .iter()
            .position(|r| r.workload_id == workload_id && r.machine_id == machine.id)
        {
            Some(index) => index,
            None => {
                let id = records.iter().map(|r| r.id).max().unwrap_or(0) + 1;
                records.push(ResultRecord::new(id, workload_id, machine.id));
                records.len() - 1
            }
        };

        machine.workload = Some(workload_id);
        let assignment = build_assignment(workload, &records[record_index], &machine.info, rng);
        debug!(
            machine_id = machine.id,
            workload_id,
            runners = assignment.distribution.runner_count,
            book_index = assignment.book_index,
            "Assigned workload"
        );
        Some(assignment)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{sample_machine_info, sample_workload};
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn machine(id: u64, workload: Option<WorkloadId>) -> Machine {
        Machine {
            id,
            info: sample_machine_info(),
            workload,
        }
    }

    #[test]
    fn test_none_without_candidates() {
        let mut rng = StdRng::seed_from_u64(1);
        let scheduler = Scheduler::default();
        let dist = WorkerDistribution::default();
        assert!(scheduler
            .select_workload(&machine(1, None), &[], &dist, &[], &mut rng)
            .is_none());
    }

    #[test]
    fn test_picks_least_served_workload() {
        let mut rng = StdRng::seed_from_u64(1);
        let workloads = vec![sample_workload(1), sample_workload(2)];
        let others = vec![machine(10, Some(1)), machine(11, Some(1)), machine(12, Some(2))];
        let dist = WorkerDistribution::build(&workloads, &others, 1);

        for _ in 0..20 {
            let chosen = Scheduler::default()
                .select_workload(&machine(1, Some(1)), &workloads, &dist, &[], &mut rng)
                .unwrap();
            assert_eq!(chosen.id, 2);
        }
    }

    #[test]
    fn test_sticks_when_pool_is_near_fair() {
        let mut rng = StdRng::seed_from_u64(3);
        let workloads = vec![sample_workload(1), sample_workload(2)];
        // 3 machines on workload 1, 2 on workload 2: min/fair = 2 / 2.5 = 0.8
        let others = vec![
            machine(10, Some(1)),
            machine(11, Some(1)),
            machine(12, Some(1)),
            machine(13, Some(2)),
            machine(14, Some(2)),
        ];
        let dist = WorkerDistribution::build(&workloads, &others, 1);

        for _ in 0..20 {
            let chosen = Scheduler::default()
                .select_workload(&machine(1, Some(1)), &workloads, &dist, &[], &mut rng)
                .unwrap();
            assert_eq!(chosen.id, 1);
        }

        // A stricter threshold moves the machine to the least-served workload
        let chosen = Scheduler::new(0.9)
            .select_workload(&machine(1, Some(1)), &workloads, &dist, &[], &mut rng)
            .unwrap();
        assert_eq!(chosen.id, 2);
    }

    #[test]
    fn test_unstaffed_workload_breaks_stickiness() {
        let mut rng = StdRng::seed_from_u64(5);
        let workloads = vec![sample_workload(1), sample_workload(2)];
        let others = vec![machine(10, Some(1))];
        let dist = WorkerDistribution::build(&workloads, &others, 1);

        let chosen = Scheduler::default()
            .select_workload(&machine(1, Some(1)), &workloads, &dist, &[], &mut rng)
            .unwrap();
        assert_eq!(chosen.id, 2);
    }

    #[test]
    fn test_assign_creates_record_and_moves_cursor() {
        let mut rng = StdRng::seed_from_u64(9);
        let mut workloads = vec![sample_workload(4)];
        let mut records = Vec::new();
        let mut requester = machine(1, None);

        let first = Scheduler::default()
            .assign(&mut requester, &mut workloads, &[], &mut records, &[], &mut rng)
            .unwrap();
        let second = Scheduler::default()
            .assign(&mut requester, &mut workloads, &[], &mut records, &[], &mut rng)
            .unwrap();

        assert_eq!(requester.workload, Some(4));
        assert_eq!(records.len(), 1);
        assert_eq!(first.result_id, second.result_id);
        assert!(second.book_index > first.book_index);
    }
}
