//! Speed normalization of time controls.

use tracing::info;

use crate::scheduler::Assignment;

/// Per-side and effective scale factors.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScaleFactors {
    pub dev: f64,
    pub base: f64,
    /// Factor applied to both engines' time controls.
    pub effective: f64,
}

/// `reference / measured`, or 1.0 when either speed is unknown.
fn side_factor(reference: u64, measured: u64) -> f64 {
    if reference == 0 || measured == 0 {
        1.0
    } else {
        reference as f64 / measured as f64
    }
}

/// Computes scale factors from measured speeds.
///
/// Cross-engine tests scale both sides by the base factor so that neither
/// engine gains time from its own speed measurement; otherwise the two
/// factors are averaged.
pub fn scale_factors(assignment: &Assignment, dev_nps: u64, base_nps: u64) -> ScaleFactors {
    let dev = side_factor(assignment.dev.nps, dev_nps);
    let base = side_factor(assignment.base.nps, base_nps);
    let effective = if assignment.dev.engine != assignment.base.engine {
        base
    } else {
        (dev + base) / 2.0
    };

    info!(
        workload_id = assignment.workload_id,
        dev = format!("{:.4}", dev),
        base = format!("{:.4}", base),
        effective = format!("{:.4}", effective),
        "Scale factors"
    );
    ScaleFactors { dev, base, effective }
}
