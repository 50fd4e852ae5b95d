//! Match-runner subprocess supervision.
//!
//! Each runner is owned by one task that reads its stdout line by line,
//! feeds a [`ResultAggregator`] and forwards completed batches. The child
//! is killed when the task is cancelled or dropped.

use std::path::Path;
use std::process::{ExitStatus, Stdio};

use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::Command;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::error::WorkerError;
use crate::aggregator::{ResultAggregator, ResultBatch};

/// How a runner task ended.
#[derive(Debug)]
pub struct RunnerExit {
    pub runner: usize,
    /// `None` when the runner was killed or could not be waited on.
    pub status: Option<ExitStatus>,
    pub cancelled: bool,
}

/// Launches runner `runner` and returns the task supervising it.
///
/// The task holds `batches` until the runner's output ends, so the
/// receiving side sees the channel close once every runner is done.
pub fn spawn_runner(
    program: &Path,
    args: Vec<String>,
    work_dir: &Path,
    runner: usize,
    batches: mpsc::UnboundedSender<ResultBatch>,
    cancel: CancellationToken,
) -> Result<JoinHandle<RunnerExit>, WorkerError> {
    info!(runner, command = %format!("{} {}", program.display(), args.join(" ")), "Launching match runner");

    let mut child = Command::new(program)
        .args(&args)
        .current_dir(work_dir)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .kill_on_drop(true)
        .spawn()
        .map_err(|source| WorkerError::RunnerLaunch { runner, source })?;

    let stdout = child.stdout.take().ok_or_else(|| WorkerError::RunnerLaunch {
        runner,
        source: std::io::Error::other("stdout not captured"),
    })?;

    Ok(tokio::spawn(async move {
        let mut aggregator = ResultAggregator::new(runner);
        let mut lines = BufReader::new(stdout).lines();
        let mut cancelled = false;

        loop {
            tokio::select! {
                biased;

                _ = cancel.cancelled() => {
                    cancelled = true;
                    break;
                }

                line = lines.next_line() => {
                    let line = match line {
                        Ok(Some(line)) => line,
                        Ok(None) => break,
                        Err(e) => {
                            warn!(runner, error = %e, "Failed to read match runner output");
                            break;
                        }
                    };
                    let line = line.trim();
                    if !line.contains("Started game") && !line.contains("Score of") {
                        debug!(runner, "{}", line);
                    }
                    if let Some(batch) = aggregator.process_line(line) {
                        if batches.send(batch).is_err() {
                            cancelled = true;
                            break;
                        }
                    }
                }
            }
        }

        if aggregator.pending_games() > 0 {
            debug!(runner, pending = aggregator.pending_games(), "Discarding unpaired games");
        }

        let status = if cancelled {
            if let Err(e) = child.kill().await {
                warn!(runner, error = %e, "Failed to kill match runner");
            }
            None
        } else {
            child.wait().await.ok()
        };

        info!(runner, ?status, cancelled, "Match runner finished");
        RunnerExit {
            runner,
            status,
            cancelled,
        }
    }))
}

/// Kills processes by executable name.
///
/// Engines are started by the match runner, not by us, so a killed runner
/// may leave them behind.
pub async fn kill_by_name(names: &[&str]) {
    for name in names.iter().filter(|n| !n.is_empty()) {
        let result = if cfg!(windows) {
            Command::new("taskkill")
                .args(["/f", "/im", name])
                .stdout(Stdio::null())
                .stderr(Stdio::null())
                .status()
                .await
        } else {
            Command::new("pkill")
                .args(["-f", name])
                .stdout(Stdio::null())
                .stderr(Stdio::null())
                .status()
                .await
        };
        if let Err(e) = result {
            debug!(process = %name, error = %e, "Name-based kill unavailable");
        }
    }
}
