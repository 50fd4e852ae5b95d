//! Fair-share workload scheduling.
//!
//! Runs on the server once per workload request. The flow is:
//!
//! ```text
//! machines ──► WorkerDistribution ──┐
//!                                   ▼
//! workloads ──► filters ──► Scheduler::select_workload ──► build_assignment
//! ```
//!
//! Selection is stateless per request. The only inputs besides the
//! candidate pool are the requesting machine (capabilities and previous
//! assignment) and a snapshot of what every other recently active machine
//! reports it is working on. The snapshot may be stale; staleness skews
//! fairness briefly but never affects statistics.

mod assign;
mod distribution;
mod filter;
mod machine;
mod select;

pub use assign::{
    build_assignment, game_distribution, spsa_assignment, Assignment, AssignmentKind,
    GameDistribution, SpsaAssignment, SpsaParameterAssignment,
};
pub use distribution::{WorkerDistribution, WorkloadLoad};
pub use filter::{filter_candidates, is_valid_assignment};
pub use machine::{Machine, MachineInfo};
pub use select::{Scheduler, DEFAULT_STICKINESS_THRESHOLD};
