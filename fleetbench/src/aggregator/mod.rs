//! Match-runner output aggregation.
//!
//! Each match-runner process feeds its stdout, one line at a time, into
//! its own [`ResultAggregator`]. The aggregator pairs games that share an
//! opening, folds completed pairs into trinomial and pentanomial counters
//! and hands back an immutable [`ResultBatch`] as soon as at least one
//! pair is complete. The reporting loop merges batches from all runners
//! into a single [`ResultReport`] per server round trip.
//!
//! # Example
//!
//! ```
//! use fleetbench::aggregator::ResultAggregator;
//!
//! let mut aggregator = ResultAggregator::new(0);
//! assert!(aggregator.process_line("Finished game 1 (dev vs base): 1-0 {White mates}").is_none());
//! let batch = aggregator
//!     .process_line("Finished game 2 (base vs dev): 0-1 {Black mates}")
//!     .unwrap();
//! assert_eq!(batch.pentanomial, [0, 0, 0, 0, 1]);
//! ```

mod batch;
mod parser;
mod result_aggregator;

pub use batch::{ResultBatch, ResultReport};
pub use parser::{parse_finished_game, DevOutcome, FinishedGame, GameResult, DEV_NAME};
pub use result_aggregator::ResultAggregator;
