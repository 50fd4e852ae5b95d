//! Assignment payloads sent to workers.

use rand::Rng;
use serde::{Deserialize, Serialize};

use super::machine::MachineInfo;
use crate::stats::spsa;
use crate::workload::{
    Adjudication, BookSpec, EngineSpec, ReportingType, ResultRecord, Side, SpsaDistribution, SpsaRun,
    Workload, WorkloadId, WorkloadMode,
};

/// How games are split across match-runner processes on one machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameDistribution {
    /// Match-runner processes to launch.
    pub runner_count: u32,
    /// Concurrent games inside each runner.
    pub concurrency: u32,
    /// Games each runner plays before the assignment ends.
    pub games_per_runner: u64,
}

impl GameDistribution {
    pub fn pairs_per_runner(&self) -> u64 {
        self.games_per_runner / 2
    }
}

/// Splits a machine's threads into runners for `workload`.
///
/// Sockets are only honoured for single-threaded engines. SPSA with
/// `Multiple` distribution runs one runner per parameter set, each playing
/// one pair at a time.
pub fn game_distribution(workload: &Workload, machine: &MachineInfo) -> GameDistribution {
    let engine_threads = workload.max_engine_threads().max(1);

    let mut threads = machine.threads.max(1);
    if machine.uses_hyperthreads() && workload.has_thread_odds() {
        threads = (threads / 2).max(1);
    }

    let sockets = if engine_threads > 1 { 1 } else { machine.sockets.max(1) };
    let max_concurrency = ((threads / sockets) / engine_threads).max(1);
    let spsa_count = ((threads / engine_threads) / 2).max(1);

    let multiple_spsa = matches!(
        &workload.mode,
        WorkloadMode::Spsa(run) if run.distribution == SpsaDistribution::Multiple
    );

    if multiple_spsa {
        GameDistribution {
            runner_count: spsa_count,
            concurrency: 2,
            games_per_runner: 2 * workload.workload_size,
        }
    } else {
        GameDistribution {
            runner_count: sockets,
            concurrency: max_concurrency,
            games_per_runner: 2 * workload.workload_size * u64::from(max_concurrency),
        }
    }
}

/// Perturbed values of one parameter, indexed by runner.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpsaParameterAssignment {
    pub name: String,
    pub is_float: bool,
    pub c: f64,
    pub r: f64,
    pub dev: Vec<f64>,
    pub base: Vec<f64>,
    pub flip: Vec<i8>,
}

impl SpsaParameterAssignment {
    /// Engine option value for `runner`; integers are printed without decimals.
    pub fn option_value(&self, side_values: &[f64], runner: usize) -> Option<String> {
        let value = *side_values.get(runner)?;
        Some(if self.is_float {
            format!("{}", value)
        } else {
            format!("{}", value.round() as i64)
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpsaAssignment {
    pub reporting: ReportingType,
    pub parameters: Vec<SpsaParameterAssignment>,
}

/// Perturbs every parameter of `run` for `runner_count` runners.
///
/// `Single` distribution draws one permutation and repeats it for every
/// runner; `Multiple` draws one per runner.
pub fn spsa_assignment<R: Rng + ?Sized>(
    run: &SpsaRun,
    games: u64,
    runner_count: u32,
    rng: &mut R,
) -> SpsaAssignment {
    let runner_count = runner_count.max(1) as usize;
    let (permutations, duplicates) = match run.distribution {
        SpsaDistribution::Single => (1, runner_count),
        SpsaDistribution::Multiple => (runner_count, 1),
    };

    let parameters = run
        .parameters
        .iter()
        .map(|param| {
            let step = run
                .schedule
                .step(param.c_value, param.a_value, param.is_float, games);
            let mut assigned = SpsaParameterAssignment {
                name: param.name.clone(),
                is_float: param.is_float,
                c: step.c,
                r: step.r,
                dev: Vec::with_capacity(runner_count),
                base: Vec::with_capacity(runner_count),
                flip: Vec::with_capacity(runner_count),
            };
            for _ in 0..permutations {
                let p = spsa::perturb(param.value, step.c, param.min, param.max, param.is_float, rng);
                for _ in 0..duplicates {
                    assigned.dev.push(p.dev);
                    assigned.base.push(p.base);
                    assigned.flip.push(p.flip);
                }
            }
            assigned
        })
        .collect();

    SpsaAssignment {
        reporting: run.reporting,
        parameters,
    }
}

/// Mode-specific part of an assignment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AssignmentKind {
    Sprt,
    FixedGames,
    Spsa(SpsaAssignment),
}

/// Read-only snapshot of a workload handed to one worker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Assignment {
    pub workload_id: WorkloadId,
    pub result_id: u64,
    pub dev: EngineSpec,
    pub base: EngineSpec,
    pub book: BookSpec,
    pub adjudication: Adjudication,
    pub kind: AssignmentKind,
    pub workload_size: u64,
    pub upload_pgns: bool,
    /// Seed for the runner's opening shuffle; stable per workload.
    pub book_seed: u64,
    /// First opening reserved for this assignment.
    pub book_index: u64,
    pub distribution: GameDistribution,
}

impl Assignment {
    pub fn engine(&self, side: Side) -> &EngineSpec {
        match side {
            Side::Dev => &self.dev,
            Side::Base => &self.base,
        }
    }

    pub fn spsa(&self) -> Option<&SpsaAssignment> {
        match &self.kind {
            AssignmentKind::Spsa(spsa) => Some(spsa),
            _ => None,
        }
    }

    /// Bulk SPSA assignments report only once, at the end.
    pub fn is_bulk(&self) -> bool {
        self.spsa()
            .is_some_and(|s| s.reporting == ReportingType::Bulk)
    }

    /// First opening of `runner`; runners use disjoint ranges.
    pub fn runner_book_start(&self, runner: usize) -> u64 {
        self.book_index + runner as u64 * self.distribution.pairs_per_runner()
    }
}

/// Builds the payload for `workload` and reserves its openings.
pub fn build_assignment<R: Rng + ?Sized>(
    workload: &mut Workload,
    record: &ResultRecord,
    machine: &MachineInfo,
    rng: &mut R,
) -> Assignment {
    let distribution = game_distribution(workload, machine);

    let kind = match &workload.mode {
        WorkloadMode::Sprt { .. } => AssignmentKind::Sprt,
        WorkloadMode::FixedGames { .. } => AssignmentKind::FixedGames,
        WorkloadMode::Spsa(run) => AssignmentKind::Spsa(spsa_assignment(
            run,
            workload.progress.games,
            distribution.runner_count,
            rng,
        )),
    };

    let book_index = workload.book_index;
    workload.book_index += u64::from(distribution.runner_count) * distribution.pairs_per_runner();

    Assignment {
        workload_id: workload.id,
        result_id: record.id,
        dev: workload.dev.clone(),
        base: workload.base.clone(),
        book: workload.book.clone(),
        adjudication: workload.adjudication.clone(),
        kind,
        workload_size: workload.workload_size,
        upload_pgns: workload.upload_pgns,
        book_seed: workload.id,
        book_index,
        distribution,
    }
}
