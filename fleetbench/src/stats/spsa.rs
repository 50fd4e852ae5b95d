//! SPSA step sizes and parameter perturbation.
//!
//! A tuning run fixes its schedule at creation time: each parameter's
//! initial perturbation `c` and learning-rate numerator `a` are derived
//! from the end-of-run targets `c_end` and `r_end`. Both decay as games
//! accumulate:
//!
//! ```text
//! iteration     = 1 + games / (2 * pairs_per)
//! c_compression = iteration ^ gamma
//! r_compression = (A + iteration) ^ alpha
//! c             = max(c_value / c_compression, 0 | 0.5)
//! r             = a_value / r_compression / c^2
//! ```

use rand::Rng;
use serde::{Deserialize, Serialize};

/// Smallest perturbation for integer parameters.
const MIN_INTEGER_C: f64 = 0.5;

/// Global schedule shared by every parameter of a tuning run.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SpsaSchedule {
    /// Planned number of iterations (pairs per parameter set).
    pub iterations: u64,
    /// Game pairs played per iteration.
    pub pairs_per: u64,
    /// Stability constant as a fraction of `iterations`.
    pub a_ratio: f64,
    /// Learning-rate decay exponent.
    pub alpha: f64,
    /// Perturbation decay exponent.
    pub gamma: f64,
}

impl Default for SpsaSchedule {
    fn default() -> Self {
        Self {
            iterations: 10_000,
            pairs_per: 8,
            a_ratio: 0.1,
            alpha: 0.602,
            gamma: 0.101,
        }
    }
}

/// Step sizes for one assignment.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StepSize {
    pub c: f64,
    pub r: f64,
}

/// One dev/base pair of perturbed values.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Perturbation {
    pub dev: f64,
    pub base: f64,
    /// `+1` when dev was pushed upward, `-1` otherwise.
    pub flip: i8,
}

impl SpsaSchedule {
    /// Stability constant `A`.
    pub fn stability(&self) -> f64 {
        self.a_ratio * self.iterations as f64
    }

    /// Initial perturbation for a parameter that should end at `c_end`.
    pub fn initial_c(&self, c_end: f64) -> f64 {
        c_end * (self.iterations as f64).powf(self.gamma)
    }

    /// Initial learning-rate numerator for a parameter ending at `c_end`, `r_end`.
    pub fn initial_a(&self, c_end: f64, r_end: f64) -> f64 {
        let a_end = r_end * c_end * c_end;
        a_end * (self.stability() + self.iterations as f64).powf(self.alpha)
    }

    /// Iteration number implied by `games` already played.
    pub fn iteration(&self, games: u64) -> f64 {
        1.0 + games as f64 / (self.pairs_per.max(1) * 2) as f64
    }

    /// Current `c` and `r` for a parameter with initial `c_value` and `a_value`.
    pub fn step(&self, c_value: f64, a_value: f64, is_float: bool, games: u64) -> StepSize {
        let iteration = self.iteration(games);
        let c_compression = iteration.powf(self.gamma);
        let r_compression = (self.stability() + iteration).powf(self.alpha);

        let floor = if is_float { 0.0 } else { MIN_INTEGER_C };
        let c = (c_value / c_compression).max(floor);
        let r = if c > 0.0 { a_value / r_compression / (c * c) } else { 0.0 };

        StepSize { c, r }
    }
}

/// Draws a random direction and perturbs `value` by `c` in both directions.
///
/// Integer parameters are rounded probabilistically (`floor(x + u)`, with
/// the same `u` for dev and base) before both sides are clipped to
/// `[min, max]`.
pub fn perturb<R: Rng + ?Sized>(
    value: f64,
    c: f64,
    min: f64,
    max: f64,
    is_float: bool,
    rng: &mut R,
) -> Perturbation {
    let flip: i8 = if rng.gen::<bool>() { 1 } else { -1 };
    let mut dev = value + f64::from(flip) * c;
    let mut base = value - f64::from(flip) * c;

    if !is_float {
        let u: f64 = rng.gen_range(0.0..1.0);
        dev = (dev + u).floor();
        base = (base + u).floor();
    }

    Perturbation {
        dev: clip(dev, min, max),
        base: clip(base, min, max),
        flip,
    }
}

/// Update contributed by one batch: `r * c * (wins - losses) * flip`.
pub fn batch_delta(step: StepSize, wins: u64, losses: u64, flip: i8) -> f64 {
    let signed = wins as f64 - losses as f64;
    step.r * step.c * signed * f64::from(flip)
}

/// Applies an accumulated delta to a parameter, keeping it inside its bounds.
pub fn apply_delta(value: f64, delta: f64, min: f64, max: f64) -> f64 {
    clip(value + delta, min, max)
}

fn clip(value: f64, min: f64, max: f64) -> f64 {
    value.max(min).min(max)
}
