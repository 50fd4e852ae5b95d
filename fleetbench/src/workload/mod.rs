//! Workload data model.
//!
//! A workload pits a `dev` engine against a `base` engine under a
//! statistical mode:
//!
//! - [`WorkloadMode::Sprt`] runs until the sequential test accepts H0 or H1
//! - [`WorkloadMode::FixedGames`] runs a fixed number of games
//! - [`WorkloadMode::Spsa`] tunes engine parameters by stochastic perturbation
//!
//! The server owns [`Workload`] records and folds worker reports into them
//! with [`Workload::apply_report`]. Workers only ever see the read-only
//! assignment built by the scheduler.

mod options;
mod progress;
mod time_control;
mod types;

pub use options::{extract_option, option_threads, tokenize_options};
pub use progress::{ApplyOutcome, ProgressError, ResultRecord, WorkloadProgress};
pub use time_control::{TimeControl, TimeControlError};
pub use types::{
    Adjudication, BookSpec, EngineSpec, ReportingType, SpsaDistribution, SpsaParameter, SpsaRun,
    Side, SyzygyRequirement, Workload, WorkloadId, WorkloadMode, WorkloadStatus,
};
