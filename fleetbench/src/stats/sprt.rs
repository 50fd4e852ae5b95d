//! Trinomial GSPRT and SPRT decision bounds.

/// Converts an Elo difference and a draw Elo into `(loss, draw, win)` probabilities
/// under the BayesElo model.
pub fn bayeselo_to_proba(elo: f64, draw_elo: f64) -> (f64, f64, f64) {
    let pwin = 1.0 / (1.0 + 10f64.powf((-elo + draw_elo) / 400.0));
    let ploss = 1.0 / (1.0 + 10f64.powf((elo + draw_elo) / 400.0));
    let pdraw = 1.0 - pwin - ploss;
    (ploss, pdraw, pwin)
}

/// Inverse of [`bayeselo_to_proba`]: recovers `(elo, draw_elo)` from outcome probabilities.
pub fn proba_to_bayeselo(ploss: f64, _pdraw: f64, pwin: f64) -> (f64, f64) {
    let elo = 200.0 * (pwin / ploss * (1.0 - ploss) / (1.0 - pwin)).log10();
    let draw_elo = 200.0 * ((1.0 - ploss) / ploss * (1.0 - pwin) / pwin).log10();
    (elo, draw_elo)
}

/// Log-likelihood ratio of H1 (`elo1`) against H0 (`elo0`) for per-game results.
///
/// The draw Elo is estimated from the observed proportions and held fixed
/// while the outcome probabilities under each hypothesis are computed.
///
/// Returns `0.0` when any of the three counts is zero; at least one loss,
/// one draw and one win are needed before the draw Elo can be estimated.
///
/// # Example
///
/// ```
/// use fleetbench::stats::trinomial_sprt;
///
/// assert_eq!(trinomial_sprt(0, 10, 10, 0.0, 5.0), 0.0);
/// assert!(trinomial_sprt(100, 200, 140, 0.0, 5.0) > 0.0);
/// ```
pub fn trinomial_sprt(losses: u64, draws: u64, wins: u64, elo0: f64, elo1: f64) -> f64 {
    if losses == 0 || draws == 0 || wins == 0 {
        return 0.0;
    }

    let counts = [losses as f64, draws as f64, wins as f64];
    let n: f64 = counts.iter().sum();
    let (ploss, pdraw, pwin) = (counts[0] / n, counts[1] / n, counts[2] / n);

    let (_, draw_elo) = proba_to_bayeselo(ploss, pdraw, pwin);

    let (l0, d0, w0) = bayeselo_to_proba(elo0, draw_elo);
    let (l1, d1, w1) = bayeselo_to_proba(elo1, draw_elo);

    counts[0] * (l1 / l0).ln() + counts[1] * (d1 / d0).ln() + counts[2] * (w1 / w0).ln()
}

/// Outcome of comparing an LLR against the SPRT bounds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SprtVerdict {
    /// H1 accepted: the dev variant is at least `elo1` stronger.
    Passed,
    /// H0 accepted: the dev variant is not `elo1` stronger.
    Failed,
    /// Not enough evidence either way.
    Continue,
}

/// Lower and upper LLR bounds of a sequential test.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SprtBounds {
    /// Accept H0 once the LLR drops below this value.
    pub lower: f64,
    /// Accept H1 once the LLR rises above this value.
    pub upper: f64,
}

impl SprtBounds {
    /// Bounds for type I error `alpha` and type II error `beta`.
    ///
    /// `lower = ln(beta / (1 - alpha))`, `upper = ln((1 - beta) / alpha)`.
    pub fn new(alpha: f64, beta: f64) -> Self {
        Self {
            lower: (beta / (1.0 - alpha)).ln(),
            upper: ((1.0 - beta) / alpha).ln(),
        }
    }

    /// Classifies an LLR against these bounds.
    pub fn verdict(&self, llr: f64) -> SprtVerdict {
        if llr > self.upper {
            SprtVerdict::Passed
        } else if llr < self.lower {
            SprtVerdict::Failed
        } else {
            SprtVerdict::Continue
        }
    }
}
