//! Statistical engine for head-to-head testing.
//!
//! Everything in this module is a pure function of its inputs: no I/O,
//! no shared state, no errors. Zero-count inputs are a valid
//! "not enough data yet" state and produce neutral results.
//!
//! - [`trinomial_sprt`] - GSPRT over per-game loss/draw/win counts
//! - [`pentanomial_sprt`] - normalized-Elo GSPRT over game-pair counts
//! - [`elo`] - Elo estimate with a 95% confidence interval
//! - [`SprtBounds`] - decision bounds derived from alpha/beta
//! - [`spsa`] - SPSA step sizes and parameter perturbation

mod elo;
mod pentanomial;
mod roots;
pub mod spsa;
mod sprt;

pub use elo::{elo, logistic_elo, normal_quantile, EloEstimate};
pub use pentanomial::{pentanomial_sprt, pentanomial_sprt_with, MleConfig};
pub use roots::brent_root;
pub use sprt::{bayeselo_to_proba, proba_to_bayeselo, trinomial_sprt, SprtBounds, SprtVerdict};
