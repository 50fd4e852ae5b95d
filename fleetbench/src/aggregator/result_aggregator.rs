//! Per-runner pairing of finished games.

use std::collections::HashMap;

use tracing::debug;

use super::batch::ResultBatch;
use super::parser::{parse_finished_game, DevOutcome};

/// Accumulates the output of one match runner.
///
/// Games `2k - 1` and `2k` share an opening with colours reversed. A pair
/// contributes once to the pentanomial counters (bucket = sum of both dev
/// outcomes, loss 0, draw 1, win 2) and twice to the trinomial counters.
/// A pair with an unfinished game contributes nothing.
#[derive(Debug)]
pub struct ResultAggregator {
    runner: usize,
    /// `None` marks a game that ended without a result.
    pending: HashMap<u64, Option<DevOutcome>>,
    current: ResultBatch,
}

impl ResultAggregator {
    pub fn new(runner: usize) -> Self {
        Self {
            runner,
            pending: HashMap::new(),
            current: ResultBatch {
                runner,
                ..Default::default()
            },
        }
    }

    pub fn runner(&self) -> usize {
        self.runner
    }

    /// Games seen whose pair partner has not finished yet.
    pub fn pending_games(&self) -> usize {
        self.pending.len()
    }

    /// Feeds one output line; returns a batch once a pair completes.
    pub fn process_line(&mut self, line: &str) -> Option<ResultBatch> {
        let game = parse_finished_game(line)?;

        self.current.crashes += u64::from(game.is_crash());
        self.current.timelosses += u64::from(game.is_timeloss());
        self.current.illegals += u64::from(game.is_illegal());

        let outcome = game.dev_outcome();
        if outcome.is_none() {
            debug!(runner = self.runner, game = game.number, "Game ended without result, voiding its pair");
        }
        self.pending.insert(game.number, outcome);
        self.complete_pair(game.number);

        self.take_batch()
    }

    fn complete_pair(&mut self, game: u64) {
        let (first, second) = if game % 2 == 1 {
            (game, game + 1)
        } else {
            (game.saturating_sub(1), game)
        };

        let (Some(&a), Some(&b)) = (self.pending.get(&first), self.pending.get(&second)) else {
            return;
        };

        self.pending.remove(&first);
        self.pending.remove(&second);

        let (Some(a), Some(b)) = (a, b) else {
            debug!(runner = self.runner, first, second, "Discarded incomplete pair");
            return;
        };

        self.current.pentanomial[a as usize + b as usize] += 1;
        self.current.trinomial[a as usize] += 1;
        self.current.trinomial[b as usize] += 1;
    }

    fn take_batch(&mut self) -> Option<ResultBatch> {
        if self.current.pentanomial.iter().all(|&c| c == 0) {
            return None;
        }
        let fresh = ResultBatch {
            runner: self.runner,
            ..Default::default()
        };
        Some(std::mem::replace(&mut self.current, fresh))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn finished(n: u64, white: &str, black: &str, result: &str) -> String {
        format!("Finished game {} ({} vs {}): {} {{Some reason}}", n, white, black, result)
    }

    #[test]
    fn test_dev_winning_both_games_is_ww() {
        let mut agg = ResultAggregator::new(0);
        assert!(agg.process_line(&finished(1, "dev", "base", "1-0")).is_none());
        let batch = agg.process_line(&finished(2, "dev", "base", "1-0")).unwrap();

        assert_eq!(batch.pentanomial, [0, 0, 0, 0, 1]);
        assert_eq!(batch.trinomial, [0, 0, 2]);
        assert_eq!(agg.pending_games(), 0);
    }

    #[test]
    fn test_loss_then_draw_is_ld() {
        let mut agg = ResultAggregator::new(0);
        agg.process_line(&finished(1, "dev", "base", "0-1"));
        let batch = agg.process_line(&finished(2, "dev", "base", "1/2-1/2")).unwrap();

        assert_eq!(batch.pentanomial, [0, 1, 0, 0, 0]);
        assert_eq!(batch.trinomial, [1, 1, 0]);
    }

    #[test]
    fn test_colour_reversed_pair() {
        let mut agg = ResultAggregator::new(3);
        agg.process_line(&finished(3, "dev", "base", "1-0"));
        let batch = agg.process_line(&finished(4, "base", "dev", "1-0")).unwrap();

        // Dev wins with white, loses with black
        assert_eq!(batch.pentanomial, [0, 0, 1, 0, 0]);
        assert_eq!(batch.trinomial, [1, 0, 1]);
        assert_eq!(batch.runner, 3);
    }

    #[test]
    fn test_out_of_order_pairs() {
        let mut agg = ResultAggregator::new(0);
        assert!(agg.process_line(&finished(2, "base", "dev", "0-1")).is_none());
        assert!(agg.process_line(&finished(3, "dev", "base", "1-0")).is_none());
        let batch = agg.process_line(&finished(1, "dev", "base", "1-0")).unwrap();

        assert_eq!(batch.pentanomial, [0, 0, 0, 0, 1]);
        assert_eq!(agg.pending_games(), 1);
    }

    #[test]
    fn test_batches_reset_counters() {
        let mut agg = ResultAggregator::new(0);
        agg.process_line(&finished(1, "dev", "base", "1-0"));
        agg.process_line(&finished(2, "base", "dev", "1/2-1/2")).unwrap();
        agg.process_line(&finished(3, "dev", "base", "0-1"));
        let second = agg.process_line(&finished(4, "base", "dev", "1-0")).unwrap();

        assert_eq!(second.pentanomial, [1, 0, 0, 0, 0]);
        assert_eq!(second.trinomial, [2, 0, 0]);
    }

    #[test]
    fn test_error_counters_ride_with_next_batch() {
        let mut agg = ResultAggregator::new(0);
        let line = "Finished game 1 (dev vs base): 0-1 {White loses on time}";
        assert!(agg.process_line(line).is_none());
        let line = "Finished game 2 (base vs dev): 1-0 {Black disconnects}";
        let batch = agg.process_line(line).unwrap();

        assert_eq!(batch.timelosses, 1);
        assert_eq!(batch.crashes, 1);
        assert_eq!(batch.pentanomial, [1, 0, 0, 0, 0]);
    }

    #[test]
    fn test_unfinished_game_voids_its_pair() {
        let mut agg = ResultAggregator::new(0);
        assert!(agg.process_line(&finished(1, "dev", "base", "*")).is_none());
        assert!(agg.process_line(&finished(2, "base", "dev", "1-0")).is_none());
        assert_eq!(agg.pending_games(), 0);

        // Partner first, unfinished game second
        assert!(agg.process_line(&finished(3, "dev", "base", "1-0")).is_none());
        assert!(agg.process_line(&finished(4, "base", "dev", "*")).is_none());
        assert_eq!(agg.pending_games(), 0);

        agg.process_line(&finished(5, "dev", "base", "1-0"));
        let batch = agg.process_line(&finished(6, "base", "dev", "0-1")).unwrap();
        assert_eq!(batch.pentanomial, [0, 0, 0, 0, 1]);
        assert_eq!(batch.trinomial, [0, 0, 2]);
    }

    #[test]
    fn test_game_zero_is_not_a_result() {
        let mut agg = ResultAggregator::new(0);
        assert!(agg.process_line(&finished(0, "dev", "base", "1-0")).is_none());
        assert_eq!(agg.pending_games(), 0);
    }

    #[test]
    fn test_non_result_lines_are_ignored() {
        let mut agg = ResultAggregator::new(0);
        assert!(agg.process_line("Started game 1 of 10 (dev vs base)").is_none());
        assert!(agg.process_line("Score of dev vs base: 0 - 0 - 0").is_none());
        assert_eq!(agg.pending_games(), 0);
    }
}
