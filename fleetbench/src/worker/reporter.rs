//! Draining loop between the runner tasks and the server.

use std::path::PathBuf;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::aggregator::{ResultBatch, ResultReport};
use crate::protocol::{Directive, ProtocolError, ServerClient, Session};
use crate::scheduler::Assignment;

/// Why the reporting loop ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportOutcome {
    /// Every runner finished its games.
    Finished,
    /// The server asked the worker to stop this workload.
    Stopped,
    /// The exit marker file appeared.
    ExitRequested,
    /// The abort token was cancelled from outside.
    Cancelled,
}

/// Collects batches and reports them.
///
/// Batches are sent as soon as they arrive unless the assignment uses bulk
/// reporting, in which case everything is held until the runners finish.
/// Heartbeats keep the assignment alive every `report_interval` while
/// nothing is sent, and a failed report is retried after the same interval.
pub struct Reporter<'a, C> {
    client: &'a C,
    session: &'a Session,
    assignment: &'a Assignment,
    report_interval: Duration,
    poll: Duration,
    exit_file: Option<PathBuf>,
}

impl<'a, C: ServerClient> Reporter<'a, C> {
    pub fn new(
        client: &'a C,
        session: &'a Session,
        assignment: &'a Assignment,
        report_interval: Duration,
        poll: Duration,
    ) -> Self {
        Self {
            client,
            session,
            assignment,
            report_interval,
            poll,
            exit_file: None,
        }
    }

    /// Stops the loop when `path` exists.
    pub fn with_exit_file(mut self, path: PathBuf) -> Self {
        self.exit_file = Some(path);
        self
    }

    /// Runs until the batch channel closes, the server stops the workload,
    /// the exit file appears or `abort` is cancelled.
    ///
    /// `abort` is cancelled by this loop whenever it ends early, which
    /// tears down the runners. Batches still pending are flushed in one
    /// final report unless the server rejected the worker.
    pub async fn run(
        &self,
        mut batches: mpsc::UnboundedReceiver<ResultBatch>,
        abort: CancellationToken,
    ) -> Result<ReportOutcome, ProtocolError> {
        let bulk = self.assignment.is_bulk();
        let mut pending: Vec<ResultBatch> = Vec::new();
        let mut last_report: Option<Instant> = None;
        let mut last_failed = false;

        let outcome = loop {
            tokio::select! {
                biased;

                _ = abort.cancelled() => break ReportOutcome::Cancelled,

                received = tokio::time::timeout(self.poll, batches.recv()) => {
                    match received {
                        Ok(Some(batch)) => {
                            pending.push(batch);
                            while let Ok(batch) = batches.try_recv() {
                                pending.push(batch);
                            }
                        }
                        Ok(None) => break ReportOutcome::Finished,
                        Err(_) => {}
                    }
                }
            }

            if self.exit_file.as_ref().is_some_and(|path| path.exists()) {
                info!(workload_id = self.assignment.workload_id, "Exit file found, stopping");
                abort.cancel();
                break ReportOutcome::ExitRequested;
            }

            let due = last_report.map_or(true, |at| at.elapsed() >= self.report_interval);
            let send_now = !bulk && !pending.is_empty() && (due || !last_failed);
            if !send_now && !due {
                continue;
            }

            last_report = Some(Instant::now());
            let reply = if send_now {
                let report = ResultReport::merge(&pending, self.assignment.spsa());
                let reply = self.client.submit_results(self.session, self.assignment, &report).await;
                if reply.is_ok() {
                    debug!(
                        workload_id = self.assignment.workload_id,
                        games = report.games(),
                        batches = pending.len(),
                        "Results reported"
                    );
                    pending.clear();
                }
                reply
            } else {
                self.client.submit_heartbeat(self.session, self.assignment).await
            };

            match reply {
                Ok(Directive::Continue) => last_failed = false,
                Ok(Directive::Stop) => {
                    info!(workload_id = self.assignment.workload_id, "Server stopped the workload");
                    abort.cancel();
                    break ReportOutcome::Stopped;
                }
                Err(e) if e.is_transient() => {
                    warn!(workload_id = self.assignment.workload_id, error = %e, "Failed to report, will retry");
                    last_failed = true;
                }
                Err(e) => {
                    warn!(workload_id = self.assignment.workload_id, error = %e, "Server rejected report");
                    abort.cancel();
                    return Err(e);
                }
            }
        };

        while let Ok(batch) = batches.try_recv() {
            pending.push(batch);
        }
        self.flush(&pending).await;
        Ok(outcome)
    }

    async fn flush(&self, pending: &[ResultBatch]) {
        if pending.is_empty() {
            return;
        }
        let report = ResultReport::merge(pending, self.assignment.spsa());
        match self.client.submit_results(self.session, self.assignment, &report).await {
            Ok(_) => info!(
                workload_id = self.assignment.workload_id,
                games = report.games(),
                "Final results reported"
            ),
            Err(e) => warn!(
                workload_id = self.assignment.workload_id,
                games = report.games(),
                error = %e,
                "Failed to report final results"
            ),
        }
    }
}
