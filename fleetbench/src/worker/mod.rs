//! The worker process: provisions engines, plays games and reports.
//!
//! A [`Daemon`] registers with the server and loops over workload
//! requests. Each assignment runs as a [`WorkloadAttempt`] through a fixed
//! sequence of phases:
//!
//! ```text
//! Provisioning → Benchmarking → Scaling → Running → Draining → Reporting → Done
//!                                                                       ↘ Aborted
//! ```
//!
//! Match runners are child processes owned by the attempt. Their finished
//! games flow through a channel to the [`Reporter`], which batches and
//! submits them and relays the server's stop directive back as a
//! cancellation.

mod bench;
mod cleanup;
mod command;
mod context;
mod coordinator;
mod daemon;
mod error;
mod identity;
pub mod provision;
mod reporter;
mod scaling;
mod settings;
mod supervisor;
pub mod system;
mod teardown;

pub use bench::{bench_args, parse_bench_output, run_benchmarks, BenchResult};
pub use cleanup::{evict_stale_files, EvictionResult};
pub use command::{pgn_path, runner_args, runner_program, MatchSetup};
pub use context::WorkerContext;
pub use coordinator::{AttemptSummary, Phase, WorkloadAttempt};
pub use daemon::{Daemon, DaemonExit};
pub use error::{BenchError, ProvisionError, WorkerError};
pub use identity::{clear_machine_id, load_machine_id, save_machine_id};
pub use reporter::{ReportOutcome, Reporter};
pub use scaling::{scale_factors, ScaleFactors};
pub use settings::{WorkDirs, WorkerSettings, EXIT_FILE, MACHINE_FILE};
pub use supervisor::{kill_by_name, spawn_runner, RunnerExit};
pub use teardown::{teardown, TeardownSummary};
