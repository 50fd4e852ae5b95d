//! Fleetbench - distributed engine testing
//!
//! This library holds both halves of a distributed testing system for
//! chess engines: the server-side decision logic and the worker that plays
//! the games.
//!
//! # Server side
//!
//! - [`stats`] decides when a test can stop (SPRT over trinomial or
//!   pentanomial counts) and drives SPSA tuning.
//! - [`scheduler`] picks which workload a registering machine should run
//!   and builds its [`scheduler::Assignment`].
//! - [`workload`] owns workload definitions and applies result reports.
//!
//! # Worker side
//!
//! - [`worker`] provisions engines, runs match runners and reports.
//! - [`aggregator`] turns match-runner output into result batches.
//! - [`protocol`] is the JSON-over-HTTP client for the server.
//!
//! ```ignore
//! use fleetbench::protocol::HttpServerClient;
//! use fleetbench::worker::{Daemon, WorkerContext, WorkerSettings};
//!
//! let context = WorkerContext::detect(settings);
//! let client = HttpServerClient::new(&url, &username, &password, timeout)?;
//! let exit = Daemon::new(&client, &context).run(&cancel).await?;
//! ```

pub mod aggregator;
pub mod config;
pub mod logging;
pub mod pgn;
pub mod protocol;
pub mod scheduler;
pub mod stats;
pub mod worker;
pub mod workload;

#[cfg(test)]
mod test_support;

/// Version of the Fleetbench library and worker.
///
/// The version is defined in `Cargo.toml` and injected at compile time.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
