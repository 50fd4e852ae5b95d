//! Elo estimation from trinomial or pentanomial counts.

/// Point estimate and 95% confidence bounds, all in Elo.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct EloEstimate {
    pub lower: f64,
    pub mean: f64,
    pub upper: f64,
}

impl std::fmt::Display for EloEstimate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{:.2} +- {:.2} [{:.2}, {:.2}]",
            self.mean,
            (self.upper - self.lower) / 2.0,
            self.lower,
            self.upper
        )
    }
}

/// Estimates Elo from outcome counts ordered from worst to best.
///
/// Accepts either three buckets (loss, draw, win) or five pair buckets.
/// Each index maps to a score `index / (len - 1)`. With no games the
/// estimate is `(0, 0, 0)`.
pub fn elo(results: &[u64]) -> EloEstimate {
    let n: u64 = results.iter().sum();
    if n == 0 || results.len() < 2 {
        return EloEstimate::default();
    }

    let n = n as f64;
    let div = (results.len() - 1) as f64;

    let mu: f64 = results
        .iter()
        .enumerate()
        .map(|(i, &c)| (i as f64 / div) * c as f64)
        .sum::<f64>()
        / n;
    let var: f64 = results
        .iter()
        .enumerate()
        .map(|(i, &c)| ((i as f64 / div) - mu).powi(2) * c as f64)
        .sum::<f64>()
        / n;

    let spread = var.sqrt() / n.sqrt();
    let mu_min = mu + normal_quantile(0.025) * spread;
    let mu_max = mu + normal_quantile(0.975) * spread;

    EloEstimate {
        lower: logistic_elo(mu_min),
        mean: logistic_elo(mu),
        upper: logistic_elo(mu_max),
    }
}

/// Maps an expected score in `(0, 1)` to an Elo difference.
///
/// Scores are clamped to `[0.001, 0.999]`.
pub fn logistic_elo(score: f64) -> f64 {
    let x = score.clamp(1e-3, 1.0 - 1e-3);
    -400.0 * (1.0 / x - 1.0).log10()
}

/// Inverse CDF of the standard normal distribution (Acklam's approximation).
pub fn normal_quantile(p: f64) -> f64 {
    const A: [f64; 6] = [
        -3.969683028665376e+01,
        2.209460984245205e+02,
        -2.759285104469687e+02,
        1.383577518672690e+02,
        -3.066479806614716e+01,
        2.506628277459239e+00,
    ];
    const B: [f64; 5] = [
        -5.447609879822406e+01,
        1.615858368580409e+02,
        -1.556989798598866e+02,
        6.680131188771972e+01,
        -1.328068155288572e+01,
    ];
    const C: [f64; 6] = [
        -7.784894002430293e-03,
        -3.223964580411365e-01,
        -2.400758277161838e+00,
        -2.549732539343734e+00,
        4.374664141464968e+00,
        2.938163982698783e+00,
    ];
    const D: [f64; 4] = [
        7.784695709041462e-03,
        3.224671290700398e-01,
        2.445134137142996e+00,
        3.754408661907416e+00,
    ];
    const P_LOW: f64 = 0.02425;

    if p <= 0.0 {
        return f64::NEG_INFINITY;
    }
    if p >= 1.0 {
        return f64::INFINITY;
    }

    if p < P_LOW {
        let q = (-2.0 * p.ln()).sqrt();
        (((((C[0] * q + C[1]) * q + C[2]) * q + C[3]) * q + C[4]) * q + C[5])
            / ((((D[0] * q + D[1]) * q + D[2]) * q + D[3]) * q + 1.0)
    } else if p <= 1.0 - P_LOW {
        let q = p - 0.5;
        let r = q * q;
        (((((A[0] * r + A[1]) * r + A[2]) * r + A[3]) * r + A[4]) * r + A[5]) * q
            / (((((B[0] * r + B[1]) * r + B[2]) * r + B[3]) * r + B[4]) * r + 1.0)
    } else {
        let q = (-2.0 * (1.0 - p).ln()).sqrt();
        -(((((C[0] * q + C[1]) * q + C[2]) * q + C[3]) * q + C[4]) * q + C[5])
            / ((((D[0] * q + D[1]) * q + D[2]) * q + D[3]) * q + 1.0)
    }
}
