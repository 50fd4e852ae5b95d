//! Pentanomial GSPRT on normalized Elo.
//!
//! Game pairs are bucketed by the combined score of the dev engine over
//! both games (0, 0.5, 1, 1.5, 2 points, scaled to `[0, 1]`). The LLR is
//! the log-likelihood ratio of two maximum-likelihood distributions,
//! each constrained to a fixed normalized t-value.

use super::roots::brent_root;

const NELO_DIVIDED_BY_NT: f64 = 800.0 / std::f64::consts::LN_10;
const MIN_COUNT: f64 = 1e-3;
const REFERENCE_SCORE: f64 = 0.5;

/// Convergence settings for the constrained MLE iteration.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MleConfig {
    /// Upper bound on fixed-point iterations.
    pub max_iterations: usize,
    /// Stop once no probability changes by more than this.
    pub tolerance: f64,
}

impl Default for MleConfig {
    fn default() -> Self {
        Self {
            max_iterations: 10,
            tolerance: 1e-9,
        }
    }
}

/// LLR for pentanomial pair counts `[LL, LD, DD/WL, WD, WW]` with default MLE settings.
///
/// Counts are clamped to a small positive floor so that empty buckets do
/// not produce infinities. Returns `0.0` when no pair has been played.
pub fn pentanomial_sprt(results: &[u64; 5], elo0: f64, elo1: f64) -> f64 {
    pentanomial_sprt_with(results, elo0, elo1, &MleConfig::default())
}

/// Like [`pentanomial_sprt`] but with explicit MLE settings.
pub fn pentanomial_sprt_with(results: &[u64; 5], elo0: f64, elo1: f64, config: &MleConfig) -> f64 {
    if results.iter().all(|&c| c == 0) {
        return 0.0;
    }

    let counts: Vec<f64> = results.iter().map(|&c| (c as f64).max(MIN_COUNT)).collect();
    let n: f64 = counts.iter().sum();

    let pdf: Vec<(f64, f64)> = counts
        .iter()
        .enumerate()
        .map(|(i, &c)| (i as f64 / 4.0, c / n))
        .collect();

    let t0 = elo0 / NELO_DIVIDED_BY_NT * 2f64.sqrt();
    let t1 = elo1 / NELO_DIVIDED_BY_NT * 2f64.sqrt();

    let (Some(pdf0), Some(pdf1)) = (
        mle_tvalue(&pdf, REFERENCE_SCORE, t0, config),
        mle_tvalue(&pdf, REFERENCE_SCORE, t1, config),
    ) else {
        return 0.0;
    };

    let llr: f64 = pdf
        .iter()
        .zip(pdf0.iter().zip(pdf1.iter()))
        .map(|(&(_, p), (&(_, p0), &(_, p1)))| p * (p1.ln() - p0.ln()))
        .sum();

    n * llr
}

fn mean_and_variance(pdf: &[(f64, f64)]) -> (f64, f64) {
    let mu: f64 = pdf.iter().map(|&(a, p)| a * p).sum();
    let var: f64 = pdf.iter().map(|&(a, p)| p * (a - mu).powi(2)).sum();
    (mu, var)
}

/// Solves `sum(p_i * a_i / (1 + x * a_i)) = 0` on the interval where all weights stay positive.
fn secular(pdf: &[(f64, f64)]) -> Option<f64> {
    let values = pdf.iter().map(|&(a, _)| a);
    let v_min = values.clone().fold(f64::INFINITY, f64::min);
    let v_max = values.fold(f64::NEG_INFINITY, f64::max);
    if v_min >= 0.0 || v_max <= 0.0 {
        return None;
    }

    let eps = 1e-9;
    let lower = -1.0 / v_max + eps;
    let upper = -1.0 / v_min - eps;
    let f = |x: f64| -> f64 { pdf.iter().map(|&(a, p)| p * a / (1.0 + x * a)).sum() };
    brent_root(f, lower, upper, 1e-12, 200)
}

/// Maximum-likelihood distribution on the support of `pdf` whose
/// normalized t-value `(mu - reference) / sigma` equals `t`.
fn mle_tvalue(pdf_hat: &[(f64, f64)], reference: f64, t: f64, config: &MleConfig) -> Option<Vec<(f64, f64)>> {
    let uniform = 1.0 / pdf_hat.len() as f64;
    let mut pdf: Vec<(f64, f64)> = pdf_hat.iter().map(|&(a, _)| (a, uniform)).collect();

    for _ in 0..config.max_iterations {
        let previous = pdf.clone();
        let (mu, var) = mean_and_variance(&pdf);
        let sigma = var.sqrt();

        let shifted: Vec<(f64, f64)> = pdf_hat
            .iter()
            .map(|&(a, p)| {
                let z = (mu - a) / sigma;
                (a - reference - t * sigma * (1.0 + z * z) / 2.0, p)
            })
            .collect();

        let x = secular(&shifted)?;

        pdf = pdf_hat
            .iter()
            .zip(shifted.iter())
            .map(|(&(a, p), &(s, _))| (a, p / (1.0 + x * s)))
            .collect();

        let change = pdf
            .iter()
            .zip(previous.iter())
            .map(|(&(_, p), &(_, q))| (p - q).abs())
            .fold(0.0, f64::max);
        if change < config.tolerance {
            break;
        }
    }

    Some(pdf)
}

#[cfg(test)]
mod tests {
    use super::*;

    const ELO0: f64 = 0.50;
    const ELO1: f64 = 2.50;

    #[test]
    fn reference_sample_llr() {
        let llr = pentanomial_sprt(&[39, 8843, 26675, 9240, 44], ELO0, ELO1);
        assert!((llr - 2.9416752079894044).abs() < 1e-9, "got {}", llr);
    }

    #[test]
    fn empty_input_is_neutral() {
        assert_eq!(pentanomial_sprt(&[0, 0, 0, 0, 0], ELO0, ELO1), 0.0);
        assert_eq!(pentanomial_sprt(&[0; 5], -3.0, 3.0), 0.0);
    }

    #[test]
    fn single_pair_is_not_short_circuited() {
        let llr = pentanomial_sprt(&[0, 0, 0, 0, 1], ELO0, ELO1);
        assert!(llr.is_finite());
        assert_ne!(llr, 0.0);
    }

    #[test]
    fn mirrored_sample_is_negative() {
        let llr = pentanomial_sprt(&[44, 9240, 26675, 8843, 39], ELO0, ELO1);
        assert!(llr < 0.0);
    }

    #[test]
    fn monotonic_in_winning_pairs() {
        let mut previous = f64::MIN;
        for ww in [0u64, 50, 100, 200, 400] {
            let llr = pentanomial_sprt(&[100, 1000, 3000, 1000, ww], 0.0, 5.0);
            assert!(llr > previous);
            previous = llr;
        }
    }

    #[test]
    fn mle_respects_target_t_value() {
        let counts = [39.0, 8843.0, 26675.0, 9240.0, 44.0];
        let n: f64 = counts.iter().sum();
        let pdf: Vec<(f64, f64)> = counts
            .iter()
            .enumerate()
            .map(|(i, c)| (i as f64 / 4.0, c / n))
            .collect();
        let config = MleConfig {
            max_iterations: 50,
            tolerance: 1e-12,
        };
        let target = 0.01;
        let mle = mle_tvalue(&pdf, 0.5, target, &config).unwrap();
        let (mu, var) = mean_and_variance(&mle);
        let t = (mu - 0.5) / var.sqrt();
        assert!((t - target).abs() < 1e-6, "t = {}", t);
        let total: f64 = mle.iter().map(|&(_, p)| p).sum();
        assert!((total - 1.0).abs() < 1e-9);
    }
}
