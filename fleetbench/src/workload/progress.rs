//! Server-side accumulation of reported results.

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info};

use super::types::{Workload, WorkloadId, WorkloadMode, WorkloadStatus};
use crate::aggregator::ResultReport;
use crate::stats::{self, spsa, MleConfig, SprtBounds, SprtVerdict};

#[derive(Debug, Error, PartialEq)]
pub enum ProgressError {
    #[error("Report for workload {got} applied to workload {expected}")]
    WrongWorkload { expected: WorkloadId, got: WorkloadId },

    #[error("Inconsistent report: {games} trinomial games for {pairs} pentanomial pairs")]
    Inconsistent { games: u64, pairs: u64 },

    #[error("Cannot {action} a workload that is {status}")]
    InvalidTransition {
        action: &'static str,
        status: WorkloadStatus,
    },
}

/// Whether the reporting worker should keep playing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApplyOutcome {
    Continue,
    Stop,
}

/// Running totals of a workload.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct WorkloadProgress {
    pub games: u64,
    pub wins: u64,
    pub losses: u64,
    pub draws: u64,
    pub crashes: u64,
    pub timelosses: u64,
    pub illegals: u64,
    /// Pair counts `[LL, LD, DD/WL, WD, WW]`.
    pub pentanomial: [u64; 5],
    /// Current LLR, SPRT mode only.
    pub llr: f64,
    /// Set once any crash, time loss or illegal move has been reported.
    pub error: bool,
}

impl WorkloadProgress {
    fn accumulate(&mut self, report: &ResultReport) {
        let [losses, draws, wins] = report.trinomial;
        self.losses += losses;
        self.draws += draws;
        self.wins += wins;
        self.games += losses + draws + wins;
        self.crashes += report.crashes;
        self.timelosses += report.timelosses;
        self.illegals += report.illegals;
        for (total, delta) in self.pentanomial.iter_mut().zip(report.pentanomial) {
            *total += delta;
        }
        self.error |= report.has_errors();
    }
}

/// Per (workload, machine) totals.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ResultRecord {
    pub id: u64,
    pub workload_id: WorkloadId,
    pub machine_id: u64,
    pub games: u64,
    pub wins: u64,
    pub losses: u64,
    pub draws: u64,
    pub crashes: u64,
    pub timelosses: u64,
}

impl ResultRecord {
    pub fn new(id: u64, workload_id: WorkloadId, machine_id: u64) -> Self {
        Self {
            id,
            workload_id,
            machine_id,
            ..Default::default()
        }
    }

    fn accumulate(&mut self, report: &ResultReport) {
        let [losses, draws, wins] = report.trinomial;
        self.games += losses + draws + wins;
        self.wins += wins;
        self.losses += losses;
        self.draws += draws;
        self.crashes += report.crashes;
        self.timelosses += report.timelosses;
    }
}

impl Workload {
    /// Folds a worker report into the workload and its result record.
    ///
    /// Reports for finished workloads are ignored and answered with
    /// [`ApplyOutcome::Stop`]. After accumulating, the mode decides whether
    /// the workload is now finished:
    ///
    /// - SPRT recomputes the LLR (pentanomial once pair data exists) and
    ///   compares it against the bounds
    /// - fixed-games finishes at `max_games`, passing iff wins >= losses
    /// - SPSA moves every reported parameter and finishes after its
    ///   planned iterations
    pub fn apply_report(
        &mut self,
        record: &mut ResultRecord,
        report: &ResultReport,
        mle: &MleConfig,
    ) -> Result<ApplyOutcome, ProgressError> {
        if record.workload_id != self.id {
            return Err(ProgressError::WrongWorkload {
                expected: self.id,
                got: record.workload_id,
            });
        }

        if self.status.is_finished() {
            debug!(workload_id = self.id, status = %self.status, "Report for finished workload");
            return Ok(ApplyOutcome::Stop);
        }

        let games = report.games();
        let pairs: u64 = report.pentanomial.iter().sum();
        if games != 2 * pairs {
            return Err(ProgressError::Inconsistent { games, pairs });
        }

        self.progress.accumulate(report);
        record.accumulate(report);

        let progress = &mut self.progress;
        let finished = match &mut self.mode {
            WorkloadMode::Sprt {
                elo0,
                elo1,
                alpha,
                beta,
            } => {
                progress.llr = if progress.pentanomial.iter().any(|&c| c > 0) {
                    stats::pentanomial_sprt_with(&progress.pentanomial, *elo0, *elo1, mle)
                } else {
                    stats::trinomial_sprt(progress.losses, progress.draws, progress.wins, *elo0, *elo1)
                };
                match SprtBounds::new(*alpha, *beta).verdict(progress.llr) {
                    SprtVerdict::Passed => Some(WorkloadStatus::Passed),
                    SprtVerdict::Failed => Some(WorkloadStatus::Failed),
                    SprtVerdict::Continue => None,
                }
            }
            WorkloadMode::FixedGames { max_games } => {
                if progress.games >= *max_games {
                    if progress.wins >= progress.losses {
                        Some(WorkloadStatus::Passed)
                    } else {
                        Some(WorkloadStatus::Failed)
                    }
                } else {
                    None
                }
            }
            WorkloadMode::Spsa(run) => {
                for param in run.parameters.iter_mut() {
                    if let Some(delta) = report.spsa_deltas.get(&param.name) {
                        param.value = spsa::apply_delta(param.value, *delta, param.min, param.max);
                    }
                }
                (progress.games >= run.planned_games()).then_some(WorkloadStatus::Passed)
            }
        };

        match finished {
            Some(status) => {
                info!(
                    workload_id = self.id,
                    status = %status,
                    games = self.progress.games,
                    llr = self.progress.llr,
                    "Workload finished"
                );
                self.status = status;
                Ok(ApplyOutcome::Stop)
            }
            None => Ok(ApplyOutcome::Continue),
        }
    }

    /// Moves an awaiting workload into the active pool.
    pub fn approve(&mut self) -> Result<(), ProgressError> {
        self.transition("approve", &[WorkloadStatus::Awaiting], WorkloadStatus::Active)
    }

    /// Halts an active workload.
    pub fn stop(&mut self) -> Result<(), ProgressError> {
        self.transition(
            "stop",
            &[WorkloadStatus::Active, WorkloadStatus::Awaiting],
            WorkloadStatus::Stopped,
        )
    }

    /// Returns a stopped or concluded workload to the active pool.
    pub fn restart(&mut self) -> Result<(), ProgressError> {
        self.transition(
            "restart",
            &[WorkloadStatus::Stopped, WorkloadStatus::Passed, WorkloadStatus::Failed],
            WorkloadStatus::Active,
        )
    }

    pub fn delete(&mut self) -> Result<(), ProgressError> {
        if self.status == WorkloadStatus::Deleted {
            return Err(ProgressError::InvalidTransition {
                action: "delete",
                status: self.status,
            });
        }
        self.status = WorkloadStatus::Deleted;
        Ok(())
    }

    fn transition(
        &mut self,
        action: &'static str,
        from: &[WorkloadStatus],
        to: WorkloadStatus,
    ) -> Result<(), ProgressError> {
        if !from.contains(&self.status) {
            return Err(ProgressError::InvalidTransition {
                action,
                status: self.status,
            });
        }
        self.status = to;
        Ok(())
    }
}
