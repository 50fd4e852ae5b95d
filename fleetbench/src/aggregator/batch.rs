//! Result batches and merged reports.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::scheduler::SpsaAssignment;
use crate::stats::spsa::{self, StepSize};

/// Counters of one runner covering a whole number of completed game pairs.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ResultBatch {
    /// Index of the runner that produced the batch.
    pub runner: usize,
    /// `[losses, draws, wins]` for dev.
    pub trinomial: [u64; 3],
    /// Pair counts `[LL, LD, DD/WL, WD, WW]`.
    pub pentanomial: [u64; 5],
    pub crashes: u64,
    pub timelosses: u64,
    pub illegals: u64,
}

/// Sum of batches submitted in one round trip.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ResultReport {
    pub trinomial: [u64; 3],
    pub pentanomial: [u64; 5],
    pub crashes: u64,
    pub timelosses: u64,
    pub illegals: u64,
    /// Per-parameter update, SPSA only.
    #[serde(default)]
    pub spsa_deltas: BTreeMap<String, f64>,
}

impl ResultReport {
    /// Merges batches into one report.
    ///
    /// For SPSA assignments each batch contributes
    /// `r * c * (wins - losses) * flip[runner]` to every parameter.
    pub fn merge(batches: &[ResultBatch], spsa: Option<&SpsaAssignment>) -> Self {
        let mut report = ResultReport::default();

        for batch in batches {
            for (total, n) in report.trinomial.iter_mut().zip(batch.trinomial) {
                *total += n;
            }
            for (total, n) in report.pentanomial.iter_mut().zip(batch.pentanomial) {
                *total += n;
            }
            report.crashes += batch.crashes;
            report.timelosses += batch.timelosses;
            report.illegals += batch.illegals;

            let Some(spsa) = spsa else { continue };
            let [losses, _, wins] = batch.trinomial;
            for param in &spsa.parameters {
                let Some(&flip) = param.flip.get(batch.runner) else {
                    warn!(runner = batch.runner, parameter = %param.name, "No SPSA permutation for runner");
                    continue;
                };
                let step = StepSize {
                    c: param.c,
                    r: param.r,
                };
                *report.spsa_deltas.entry(param.name.clone()).or_insert(0.0) +=
                    spsa::batch_delta(step, wins, losses, flip);
            }
        }

        report
    }

    pub fn games(&self) -> u64 {
        self.trinomial.iter().sum()
    }

    pub fn has_errors(&self) -> bool {
        self.crashes > 0 || self.timelosses > 0 || self.illegals > 0
    }

    pub fn is_empty(&self) -> bool {
        self.games() == 0 && !self.has_errors()
    }
}
