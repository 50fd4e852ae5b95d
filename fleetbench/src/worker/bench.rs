//! Engine verification through the `bench` command.
//!
//! One bench process runs per game thread so the measured speed reflects
//! a fully loaded machine.

use std::path::Path;
use std::process::Stdio;
use std::sync::OnceLock;
use std::time::Duration;

use futures::future::join_all;
use regex::Regex;
use tokio::process::Command;
use tracing::{debug, info, warn};

use super::error::BenchError;

/// Outcome of a successful bench pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BenchResult {
    /// Node count every run agreed on.
    pub bench: u64,
    /// Mean nodes per second across runs.
    pub nps: u64,
}

fn speed_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"(?i)(\d+\s+nps)|(nps\s+\d+)|(nodes second\s+\d+)").expect("Valid regex")
    })
}

fn nodes_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"(?i)(\d+\s+nodes)|(nodes\s+\d+)|(nodes searched\s+\d+)").expect("Valid regex")
    })
}

fn first_number(text: &str) -> Option<u64> {
    text.split_whitespace().find_map(|word| word.parse().ok())
}

/// Extracts `(bench, nps)` from engine output, scanning from the last line up.
///
/// Punctuation is ignored, so `Nodes searched  : 4506523` and
/// `Nodes/second : 1524331` are both recognised.
pub fn parse_bench_output(output: &str) -> (Option<u64>, Option<u64>) {
    let mut bench = None;
    let mut speed = None;

    for line in output.lines().rev() {
        let cleaned: String = line
            .chars()
            .map(|c| if c.is_alphanumeric() { c } else { ' ' })
            .collect();

        if speed.is_none() {
            speed = speed_pattern()
                .find(&cleaned)
                .and_then(|m| first_number(m.as_str()));
        }
        if bench.is_none() {
            bench = nodes_pattern()
                .find(&cleaned)
                .and_then(|m| first_number(m.as_str()));
        }
        if bench.is_some() && speed.is_some() {
            break;
        }
    }

    (bench, speed)
}

/// Command-line arguments of one bench run.
///
/// Private engines load their network over UCI before benching.
pub fn bench_args(private_network: Option<&Path>) -> Vec<String> {
    match private_network {
        None => vec!["bench".to_string()],
        Some(network) => vec![
            format!("setoption name EvalFile value {}", network.display()),
            "bench".to_string(),
            "quit".to_string(),
        ],
    }
}

async fn run_bench(binary: &Path, args: &[String]) -> Result<(u64, u64), BenchError> {
    let mut command = Command::new(binary);
    command
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);
    if let Some(dir) = binary.parent() {
        command.current_dir(dir);
    }

    let output = command
        .output()
        .await
        .map_err(|e| BenchError::FailedToExecute(format!("{}: {}", binary.display(), e)))?;

    let text = format!(
        "{}\n{}",
        String::from_utf8_lossy(&output.stdout),
        String::from_utf8_lossy(&output.stderr)
    );
    match parse_bench_output(&text) {
        (Some(bench), Some(nps)) => Ok((bench, nps)),
        _ => Err(BenchError::FailedToExecute(format!(
            "{} printed no bench (exit status {})",
            binary.display(),
            output.status
        ))),
    }
}

/// Runs `threads` concurrent benches of `binary` and checks them against
/// `expected`.
///
/// Runs still going after `timeout` are killed with their handles.
pub async fn run_benchmarks(
    binary: &Path,
    private_network: Option<&Path>,
    threads: u32,
    timeout: Duration,
    expected: u64,
) -> Result<BenchResult, BenchError> {
    let args = bench_args(private_network);
    let threads = threads.max(1);
    info!(binary = %binary.display(), threads, "Running benchmarks");

    let runs = (0..threads).map(|_| run_bench(binary, &args));
    let results = match tokio::time::timeout(timeout, join_all(runs)).await {
        Ok(results) => results,
        Err(_) => {
            warn!(binary = %binary.display(), "Bench timed out");
            return Err(BenchError::Timeout(timeout.as_secs()));
        }
    };

    let mut benches = Vec::with_capacity(results.len());
    let mut speeds = Vec::with_capacity(results.len());
    for result in results {
        let (bench, nps) = result?;
        benches.push(bench);
        speeds.push(nps);
    }

    let bench = benches[0];
    if benches.iter().any(|&b| b != bench) {
        return Err(BenchError::NonDeterministic { observed: benches });
    }
    if bench != expected {
        return Err(BenchError::WrongBench {
            expected,
            observed: bench,
        });
    }

    let nps = speeds.iter().sum::<u64>() / speeds.len() as u64;
    debug!(binary = %binary.display(), bench, nps, "Bench verified");
    Ok(BenchResult { bench, nps })
}
