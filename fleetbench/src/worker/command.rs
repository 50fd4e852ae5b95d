//! Match-runner command lines.

use std::path::PathBuf;

use crate::scheduler::Assignment;
use crate::workload::{tokenize_options, Side, SyzygyRequirement};

/// File name of the match runner inside the working directory.
pub fn runner_program() -> &'static str {
    if cfg!(windows) {
        "cutechess-ob.exe"
    } else {
        "cutechess-ob"
    }
}

/// Everything a runner needs beyond the assignment itself.
#[derive(Debug, Clone)]
pub struct MatchSetup {
    /// Binary names inside `Engines/`.
    pub dev_binary: String,
    pub base_binary: String,
    pub scale_factor: f64,
    /// Syzygy directories, if the machine has any.
    pub syzygy_path: Option<String>,
    pub syzygy_max: u8,
    /// Seconds since the epoch, shared by all runners of one attempt.
    pub timestamp: i64,
}

impl MatchSetup {
    fn syzygy_path(&self) -> Option<String> {
        self.syzygy_path
            .as_deref()
            .filter(|_| self.syzygy_max > 0)
            .map(|p| p.replace('\\', "\\\\"))
    }

    fn binary(&self, side: Side) -> &str {
        match side {
            Side::Dev => &self.dev_binary,
            Side::Base => &self.base_binary,
        }
    }
}

/// PGN file of `runner`, relative to the working directory.
pub fn pgn_path(assignment: &Assignment, timestamp: i64, runner: usize) -> PathBuf {
    PathBuf::from("PGNs").join(format!(
        "{}.{}.{}.{}.pgn",
        assignment.workload_id, assignment.result_id, timestamp, runner
    ))
}

/// Arguments of the match runner with index `runner`.
pub fn runner_args(assignment: &Assignment, setup: &MatchSetup, runner: usize) -> Vec<String> {
    let mut args: Vec<String> = Vec::new();
    let variant = if assignment.book.is_fischer_random() {
        "fischerandom"
    } else {
        "standard"
    };
    push_all(&mut args, ["-repeat", "-recover", "-variant", variant]);

    let distribution = &assignment.distribution;
    args.push("-concurrency".to_string());
    args.push(distribution.concurrency.to_string());
    args.push("-games".to_string());
    args.push(distribution.games_per_runner.to_string());

    adjudication_args(&mut args, assignment, setup);

    for side in Side::BOTH {
        engine_args(&mut args, assignment, setup, side, runner);
    }

    let book = &assignment.book;
    let format = book.name.rsplit('.').next().unwrap_or("epd");
    args.push("-openings".to_string());
    args.push(format!("file=Books/{}", book.name));
    args.push(format!("format={}", format));
    args.push("order=random".to_string());
    args.push(format!("start={}", assignment.runner_book_start(runner)));
    args.push("-srand".to_string());
    args.push(assignment.book_seed.to_string());

    args.push("-pgnout".to_string());
    args.push(
        pgn_path(assignment, setup.timestamp, runner)
            .to_string_lossy()
            .replace('\\', "/"),
    );

    args
}

fn push_all<'a>(args: &mut Vec<String>, items: impl IntoIterator<Item = &'a str>) {
    args.extend(items.into_iter().map(String::from));
}

fn adjudication_args(args: &mut Vec<String>, assignment: &Assignment, setup: &MatchSetup) {
    let adjudication = &assignment.adjudication;
    if let Some(resign) = &adjudication.win_adj {
        args.push("-resign".to_string());
        push_all(args, resign.split_whitespace());
    }
    if let Some(draw) = &adjudication.draw_adj {
        args.push("-draw".to_string());
        push_all(args, draw.split_whitespace());
    }

    if adjudication.syzygy_adj != SyzygyRequirement::Disabled {
        if let Some(path) = setup.syzygy_path() {
            args.push("-tb".to_string());
            args.push(path);
        }
    }
    if let SyzygyRequirement::Pieces(pieces) = adjudication.syzygy_adj {
        args.push("-tbpieces".to_string());
        args.push(pieces.to_string());
    }
}

/// UCI options of one engine, before the `option.` prefix is applied.
fn engine_options(assignment: &Assignment, setup: &MatchSetup, side: Side, runner: usize) -> Vec<String> {
    let engine = assignment.engine(side);
    let mut options: Vec<String> = tokenize_options(&engine.options)
        .into_iter()
        .map(|token| token.replace('"', ""))
        .collect();

    if engine.private {
        if let Some(network) = &engine.network {
            options.push(format!("EvalFile=../Networks/{}", network));
        }
    }

    let syzygy_wdl = assignment.adjudication.syzygy_wdl;
    if syzygy_wdl != SyzygyRequirement::Disabled {
        if let Some(path) = setup.syzygy_path() {
            options.push(format!("SyzygyPath={}", path));
        }
    }
    if let SyzygyRequirement::Pieces(pieces) = syzygy_wdl {
        options.push(format!("SyzygyProbeLimit={}", pieces));
    }

    if let Some(spsa) = assignment.spsa() {
        for param in &spsa.parameters {
            let values = match side {
                Side::Dev => &param.dev,
                Side::Base => &param.base,
            };
            if let Some(value) = param.option_value(values, runner) {
                options.push(format!("{}={}", param.name, value));
            }
        }
    }

    options
}

fn engine_args(args: &mut Vec<String>, assignment: &Assignment, setup: &MatchSetup, side: Side, runner: usize) {
    let engine = assignment.engine(side);
    args.push("-engine".to_string());
    args.push("dir=Engines/".to_string());
    args.push(format!("cmd=./{}", setup.binary(side)));
    args.push("proto=uci".to_string());
    push_all(
        args,
        engine
            .time_control
            .runner_flags(setup.scale_factor)
            .split_whitespace(),
    );
    args.extend(
        engine_options(assignment, setup, side, runner)
            .into_iter()
            .map(|option| format!("option.{}", option)),
    );
    args.push(format!("name={}", side.as_str()));
}
