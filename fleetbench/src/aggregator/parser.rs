//! Parsing of match-runner progress lines.

use std::sync::OnceLock;

use regex::Regex;

/// Engine name the dev side is registered under with the match runner.
pub const DEV_NAME: &str = "dev";

/// Result token of a finished game, from white's point of view.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GameResult {
    WhiteWin,
    Draw,
    BlackWin,
    /// Game ended without a result (`*`), e.g. after a runner abort.
    Unfinished,
}

/// Outcome of a game for the dev engine. Discriminants index trinomial counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DevOutcome {
    Loss = 0,
    Draw = 1,
    Win = 2,
}

/// A parsed `Finished game` line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FinishedGame {
    pub number: u64,
    pub white: String,
    pub black: String,
    pub result: GameResult,
    /// Termination comment, e.g. `White mates` or `Black loses on time`.
    pub reason: String,
}

impl FinishedGame {
    /// Whether dev played white in this game.
    ///
    /// Uses the engine names when either side is the dev engine; otherwise
    /// falls back to the runner's convention that the first game of each
    /// pair gives dev the white pieces.
    pub fn dev_is_white(&self) -> bool {
        if self.white == DEV_NAME {
            true
        } else if self.black == DEV_NAME {
            false
        } else {
            self.number % 2 == 1
        }
    }

    /// Result from the dev engine's perspective, `None` for unfinished games.
    pub fn dev_outcome(&self) -> Option<DevOutcome> {
        let white = match self.result {
            GameResult::WhiteWin => DevOutcome::Win,
            GameResult::Draw => return Some(DevOutcome::Draw),
            GameResult::BlackWin => DevOutcome::Loss,
            GameResult::Unfinished => return None,
        };
        Some(match (white, self.dev_is_white()) {
            (outcome, true) => outcome,
            (DevOutcome::Win, false) => DevOutcome::Loss,
            (_, false) => DevOutcome::Win,
        })
    }

    pub fn is_crash(&self) -> bool {
        self.reason.contains("disconnect") || self.reason.contains("stalls")
    }

    pub fn is_timeloss(&self) -> bool {
        self.reason.contains("on time")
    }

    pub fn is_illegal(&self) -> bool {
        self.reason.contains("illegal")
    }
}

fn finished_game_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^Finished game (\d+) \((.+) vs (.+)\): (1-0|0-1|1/2-1/2|\*)\s*(?:\{(.*)\})?")
            .expect("Valid regex")
    })
}

/// Parses `Finished game <n> (<white> vs <black>): <result> {<reason>}`.
///
/// Returns `None` for any other line. Games are numbered from 1.
pub fn parse_finished_game(line: &str) -> Option<FinishedGame> {
    let caps = finished_game_regex().captures(line.trim())?;

    let result = match &caps[4] {
        "1-0" => GameResult::WhiteWin,
        "0-1" => GameResult::BlackWin,
        "1/2-1/2" => GameResult::Draw,
        _ => GameResult::Unfinished,
    };

    Some(FinishedGame {
        number: caps[1].parse().ok().filter(|&n| n > 0)?,
        white: caps[2].to_string(),
        black: caps[3].to_string(),
        result,
        reason: caps.get(5).map(|m| m.as_str().to_string()).unwrap_or_default(),
    })
}
