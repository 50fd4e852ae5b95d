//! One workload attempt, from provisioning to teardown.
//!
//! ```text
//! Provisioning -> Benchmarking -> Scaling -> Running -> Draining -> Reporting -> Done
//!       |              |                        |           |
//!       +--------------+------------------------+-----------+--> Aborted
//! ```
//!
//! Provisioning and bench failures are reported to the server and end
//! only this attempt. The daemon decides what happens next.

use std::path::PathBuf;

use futures::future::join_all;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::bench::run_benchmarks;
use super::command::{runner_args, runner_program, MatchSetup};
use super::context::WorkerContext;
use super::error::{ProvisionError, WorkerError};
use super::provision::Provisioner;
use super::reporter::{ReportOutcome, Reporter};
use super::scaling::{scale_factors, ScaleFactors};
use super::supervisor::{kill_by_name, spawn_runner};
use super::teardown::{teardown, TeardownSummary};
use crate::protocol::{ServerClient, Session};
use crate::scheduler::Assignment;
use crate::workload::Side;

/// Stage of an attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Provisioning,
    Benchmarking,
    Scaling,
    Running,
    Draining,
    Reporting,
    Done,
    Aborted,
}

/// Binaries and networks of both sides after provisioning.
#[derive(Debug, Clone, Default)]
struct Provisioned {
    dev_binary: String,
    base_binary: String,
    dev_network: Option<PathBuf>,
    base_network: Option<PathBuf>,
}

impl Provisioned {
    fn binary(&self, side: Side) -> &str {
        match side {
            Side::Dev => &self.dev_binary,
            Side::Base => &self.base_binary,
        }
    }

    fn network(&self, side: Side) -> Option<&PathBuf> {
        match side {
            Side::Dev => self.dev_network.as_ref(),
            Side::Base => self.base_network.as_ref(),
        }
    }
}

/// Result of an attempt that got as far as running games.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AttemptSummary {
    pub outcome: ReportOutcome,
    pub factors: ScaleFactors,
    pub teardown: TeardownSummary,
}

/// Drives a single assignment through its phases.
pub struct WorkloadAttempt<'a, C> {
    client: &'a C,
    session: &'a Session,
    context: &'a WorkerContext,
    assignment: &'a Assignment,
    phase: Phase,
}

impl<'a, C: ServerClient> WorkloadAttempt<'a, C> {
    pub fn new(client: &'a C, session: &'a Session, context: &'a WorkerContext, assignment: &'a Assignment) -> Self {
        Self {
            client,
            session,
            context,
            assignment,
            phase: Phase::Provisioning,
        }
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    fn enter(&mut self, phase: Phase) {
        debug!(workload_id = self.assignment.workload_id, from = ?self.phase, to = ?phase, "Attempt phase");
        self.phase = phase;
    }

    /// Runs the attempt; `cancel` aborts it from outside.
    pub async fn run(&mut self, cancel: &CancellationToken) -> Result<AttemptSummary, WorkerError> {
        let result = self.run_phases(cancel).await;
        match &result {
            Ok(_) => self.enter(Phase::Done),
            Err(_) => self.enter(Phase::Aborted),
        }
        result
    }

    async fn run_phases(&mut self, cancel: &CancellationToken) -> Result<AttemptSummary, WorkerError> {
        info!(
            workload_id = self.assignment.workload_id,
            dev = %self.assignment.dev.name,
            base = %self.assignment.base.name,
            "Starting workload"
        );

        let provisioned = self.provision().await?;

        self.enter(Phase::Benchmarking);
        let (dev_nps, base_nps) = self.benchmark(&provisioned).await?;

        self.enter(Phase::Scaling);
        let factors = scale_factors(self.assignment, dev_nps, base_nps);

        self.enter(Phase::Running);
        let setup = MatchSetup {
            dev_binary: provisioned.dev_binary.clone(),
            base_binary: provisioned.base_binary.clone(),
            scale_factor: factors.effective,
            syzygy_path: self.context.settings.syzygy_path.clone(),
            syzygy_max: self.context.syzygy_max,
            timestamp: chrono::Utc::now().timestamp(),
        };
        let outcome = self.play(&setup, cancel).await?;

        self.enter(Phase::Reporting);
        let teardown = match outcome {
            ReportOutcome::Finished | ReportOutcome::Stopped => {
                teardown(
                    self.client,
                    self.session,
                    self.assignment,
                    &self.context.dirs,
                    setup.timestamp,
                    factors.effective,
                )
                .await
            }
            ReportOutcome::ExitRequested | ReportOutcome::Cancelled => TeardownSummary::default(),
        };

        Ok(AttemptSummary {
            outcome,
            factors,
            teardown,
        })
    }

    async fn provision(&mut self) -> Result<Provisioned, WorkerError> {
        let result = self.provision_all().await;
        if let Err(e) = &result {
            let logs = match e {
                ProvisionError::BuildFailed { output, .. } => output.as_str(),
                _ => "",
            };
            if let Err(report) = self
                .client
                .submit_error(self.session, self.assignment, e.side(), &e.to_string(), logs)
                .await
            {
                warn!(error = %report, "Failed to report provisioning error");
            }
        }
        Ok(result?)
    }

    async fn provision_all(&self) -> Result<Provisioned, ProvisionError> {
        let provisioner = Provisioner::new(self.client, &self.context.dirs, &self.context.cpu);
        provisioner.provision_book(&self.assignment.book).await?;

        let mut provisioned = Provisioned::default();
        for side in Side::BOTH {
            let engine = self.assignment.engine(side);
            let network = provisioner.provision_network(engine).await?;
            let embedded = if engine.private { None } else { network.as_deref() };
            let binary = provisioner.provision_engine(side, engine, embedded).await?;

            let private_network = if engine.private { network } else { None };
            match side {
                Side::Dev => {
                    provisioned.dev_binary = binary;
                    provisioned.dev_network = private_network;
                }
                Side::Base => {
                    provisioned.base_binary = binary;
                    provisioned.base_network = private_network;
                }
            }
        }
        Ok(provisioned)
    }

    /// Verifies both engines and reports their speed.
    async fn benchmark(&self, provisioned: &Provisioned) -> Result<(u64, u64), WorkerError> {
        let settings = &self.context.settings;
        let mut speeds = [0u64; 2];

        for (slot, side) in Side::BOTH.into_iter().enumerate() {
            let engine = self.assignment.engine(side);
            let binary = self.context.dirs.engines().join(provisioned.binary(side));
            let result = run_benchmarks(
                &binary,
                provisioned.network(side).map(PathBuf::as_path),
                settings.threads,
                settings.bench_timeout(),
                engine.bench,
            )
            .await;

            match result {
                Ok(bench) => {
                    info!(side = %side, bench = bench.bench, nps = bench.nps, "Bench verified");
                    speeds[slot] = bench.nps;
                }
                Err(source) => {
                    warn!(side = %side, error = %source, "Bench failed");
                    let reported = match source.observed_bench() {
                        Some(observed) => {
                            self.client
                                .submit_bad_bench(self.session, self.assignment, side, observed)
                                .await
                        }
                        None => {
                            self.client
                                .submit_error(self.session, self.assignment, Some(side), &source.to_string(), "")
                                .await
                        }
                    };
                    if let Err(e) = reported {
                        warn!(error = %e, "Failed to report bench failure");
                    }
                    return Err(WorkerError::Bench { side, source });
                }
            }
        }

        if let Err(e) = self
            .client
            .submit_nps(self.session, self.assignment, speeds[0], speeds[1])
            .await
        {
            warn!(error = %e, "Failed to report speed");
        }
        Ok((speeds[0], speeds[1]))
    }

    /// Launches the runners and drains their results.
    async fn play(&mut self, setup: &MatchSetup, cancel: &CancellationToken) -> Result<ReportOutcome, WorkerError> {
        let context = self.context;
        let dirs = &context.dirs;
        let settings = &context.settings;
        let program = dirs.root().join(runner_program());
        let abort = cancel.child_token();
        let (tx, rx) = mpsc::unbounded_channel();

        let mut handles = Vec::new();
        for runner in 0..self.assignment.distribution.runner_count as usize {
            let args = runner_args(self.assignment, setup, runner);
            match spawn_runner(&program, args, dirs.root(), runner, tx.clone(), abort.clone()) {
                Ok(handle) => handles.push(handle),
                Err(e) => {
                    abort.cancel();
                    join_all(handles).await;
                    return Err(e);
                }
            }
        }
        drop(tx);

        self.enter(Phase::Draining);
        let reporter = Reporter::new(
            self.client,
            self.session,
            self.assignment,
            settings.report_interval(),
            settings.result_poll(),
        )
        .with_exit_file(dirs.exit_file());
        let reported = reporter.run(rx, abort.clone()).await;

        if abort.is_cancelled() {
            kill_by_name(&[runner_program(), &setup.dev_binary, &setup.base_binary]).await;
        }
        for exit in join_all(handles).await {
            match exit {
                Ok(exit) => debug!(runner = exit.runner, status = ?exit.status, cancelled = exit.cancelled, "Runner exited"),
                Err(e) => warn!(error = %e, "Runner task failed"),
            }
        }

        Ok(reported?)
    }
}
