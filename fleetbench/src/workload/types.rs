//! Workload records and their building blocks.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::options::option_threads;
use super::progress::WorkloadProgress;
use super::time_control::TimeControl;
use crate::stats::spsa::SpsaSchedule;

pub type WorkloadId = u64;

/// The two sides of a match.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    Dev,
    Base,
}

impl Side {
    pub const BOTH: [Side; 2] = [Side::Dev, Side::Base];

    /// Engine name registered with the match runner.
    pub fn as_str(&self) -> &'static str {
        match self {
            Side::Dev => "dev",
            Side::Base => "base",
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One side of a match.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineSpec {
    /// Program identity, e.g. `Ethereal`. Two specs with the same engine are
    /// versions of one program.
    pub engine: String,
    /// Branch or build name, for display.
    pub name: String,
    /// Source archive URL, or the artifact listing URL for private engines.
    pub source: String,
    /// Full commit hash.
    pub sha: String,
    /// Expected deterministic bench node count.
    pub bench: u64,
    /// UCI options, e.g. `Threads=1 Hash=16`.
    #[serde(default)]
    pub options: String,
    /// Truncated SHA-256 identifier of the network weights, if any.
    #[serde(default)]
    pub network: Option<String>,
    /// Display name of the network.
    #[serde(default)]
    pub netname: Option<String>,
    pub time_control: TimeControl,
    /// Reference nodes-per-second the time control was calibrated against.
    pub nps: u64,
    /// Private engines ship pre-built artifacts instead of sources.
    #[serde(default)]
    pub private: bool,
    /// Directory inside the source archive that holds the makefile.
    #[serde(default)]
    pub build_path: String,
}

impl EngineSpec {
    pub fn threads(&self) -> u32 {
        option_threads(&self.options)
    }

    /// Cache key of the built binary: engine, commit prefix and, for source
    /// builds with embedded weights, the network identifier.
    pub fn binary_name(&self) -> String {
        let engine: String = self
            .engine
            .chars()
            .filter(|c| c.is_ascii_alphanumeric())
            .collect();
        let commit: String = self.sha.to_uppercase().chars().take(16).collect();
        let mut name = format!("{}-{}", engine, commit);
        if let (Some(network), false) = (self.network.as_deref(), self.private) {
            let short: String = network.chars().take(8).collect();
            name.push('-');
            name.push_str(&short);
        }
        name
    }
}

/// Opening book descriptor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BookSpec {
    pub name: String,
    /// Full SHA-256 of the uncompressed book.
    pub sha: String,
    /// URL of a zip archive containing the book.
    pub source: String,
}

impl BookSpec {
    /// Chess960 books are recognised by name.
    pub fn is_fischer_random(&self) -> bool {
        let upper = self.name.to_uppercase();
        ["FRC", "960", "FISCHER"].iter().any(|tag| upper.contains(tag))
    }
}

/// Tablebase requirement of a workload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SyzygyRequirement {
    /// Tablebases must not be used.
    #[default]
    Disabled,
    /// Use whatever the machine has.
    Optional,
    /// The machine must provide complete N-piece tablebases.
    Pieces(u8),
}

impl SyzygyRequirement {
    pub fn required_pieces(&self) -> u8 {
        match self {
            SyzygyRequirement::Pieces(n) => *n,
            _ => 0,
        }
    }
}

impl fmt::Display for SyzygyRequirement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SyzygyRequirement::Disabled => write!(f, "DISABLED"),
            SyzygyRequirement::Optional => write!(f, "OPTIONAL"),
            SyzygyRequirement::Pieces(n) => write!(f, "{}-MAN", n),
        }
    }
}

impl FromStr for SyzygyRequirement {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_uppercase().as_str() {
            "DISABLED" => Ok(SyzygyRequirement::Disabled),
            "OPTIONAL" => Ok(SyzygyRequirement::Optional),
            other => other
                .strip_suffix("-MAN")
                .and_then(|n| n.parse().ok())
                .map(SyzygyRequirement::Pieces)
                .ok_or_else(|| format!("invalid syzygy requirement '{}'", s)),
        }
    }
}

impl Serialize for SyzygyRequirement {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for SyzygyRequirement {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// Adjudication rules passed to the match runner.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Adjudication {
    /// Tablebase probing inside the engines.
    #[serde(default)]
    pub syzygy_wdl: SyzygyRequirement,
    /// Tablebase adjudication by the match runner.
    #[serde(default)]
    pub syzygy_adj: SyzygyRequirement,
    /// Runner `-resign` arguments, e.g. `movecount=3 score=400`.
    #[serde(default)]
    pub win_adj: Option<String>,
    /// Runner `-draw` arguments, e.g. `movenumber=40 movecount=8 score=10`.
    #[serde(default)]
    pub draw_adj: Option<String>,
}

impl Adjudication {
    /// Largest tablebase size either rule depends on.
    pub fn required_pieces(&self) -> u8 {
        self.syzygy_wdl
            .required_pieces()
            .max(self.syzygy_adj.required_pieces())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SpsaDistribution {
    /// One parameter set per assignment, duplicated across runners.
    #[default]
    Single,
    /// One parameter set per runner.
    Multiple,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReportingType {
    /// Report each completed pair as it arrives.
    #[default]
    Batched,
    /// Report once, when the assignment completes.
    Bulk,
}

/// A tunable engine parameter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpsaParameter {
    pub name: String,
    pub is_float: bool,
    /// Current best estimate.
    pub value: f64,
    pub start: f64,
    pub min: f64,
    pub max: f64,
    pub c_end: f64,
    pub r_end: f64,
    /// Initial perturbation, derived from `c_end`.
    pub c_value: f64,
    /// Initial learning-rate numerator, derived from `c_end` and `r_end`.
    pub a_value: f64,
}

impl SpsaParameter {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        name: impl Into<String>,
        is_float: bool,
        start: f64,
        min: f64,
        max: f64,
        c_end: f64,
        r_end: f64,
        schedule: &SpsaSchedule,
    ) -> Self {
        Self {
            name: name.into(),
            is_float,
            value: start,
            start,
            min,
            max,
            c_end,
            r_end,
            c_value: schedule.initial_c(c_end),
            a_value: schedule.initial_a(c_end, r_end),
        }
    }
}

/// SPSA tuning state owned by a workload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpsaRun {
    pub schedule: SpsaSchedule,
    #[serde(default)]
    pub distribution: SpsaDistribution,
    #[serde(default)]
    pub reporting: ReportingType,
    pub parameters: Vec<SpsaParameter>,
}

impl SpsaRun {
    /// Games after which the planned iterations are complete.
    pub fn planned_games(&self) -> u64 {
        self.schedule.iterations * self.schedule.pairs_per * 2
    }
}

/// Statistical mode of a workload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum WorkloadMode {
    Sprt {
        elo0: f64,
        elo1: f64,
        alpha: f64,
        beta: f64,
    },
    FixedGames {
        max_games: u64,
    },
    Spsa(SpsaRun),
}

impl WorkloadMode {
    pub fn is_spsa(&self) -> bool {
        matches!(self, WorkloadMode::Spsa(_))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WorkloadStatus {
    /// Created, not yet approved.
    #[default]
    Awaiting,
    Active,
    Passed,
    Failed,
    Stopped,
    Deleted,
}

impl WorkloadStatus {
    /// Reports for finished workloads are answered with a stop directive.
    pub fn is_finished(&self) -> bool {
        !matches!(self, WorkloadStatus::Awaiting | WorkloadStatus::Active)
    }
}

impl fmt::Display for WorkloadStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            WorkloadStatus::Awaiting => "awaiting",
            WorkloadStatus::Active => "active",
            WorkloadStatus::Passed => "passed",
            WorkloadStatus::Failed => "failed",
            WorkloadStatus::Stopped => "stopped",
            WorkloadStatus::Deleted => "deleted",
        };
        write!(f, "{}", s)
    }
}

/// A test or tune, as stored by the server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Workload {
    pub id: WorkloadId,
    pub dev: EngineSpec,
    pub base: EngineSpec,
    pub book: BookSpec,
    #[serde(default)]
    pub adjudication: Adjudication,
    pub mode: WorkloadMode,
    #[serde(default)]
    pub priority: i32,
    /// Relative share of fleet threads this workload should receive.
    pub throughput: u32,
    /// Ceiling on machines working this workload at once.
    #[serde(default)]
    pub max_workers: Option<u32>,
    /// Ceiling on threads working this workload at once.
    #[serde(default)]
    pub max_threads: Option<u32>,
    /// Game pairs per concurrent game slot in one assignment.
    pub workload_size: u64,
    #[serde(default)]
    pub upload_pgns: bool,
    #[serde(default)]
    pub status: WorkloadStatus,
    /// Next unused opening book offset.
    #[serde(default)]
    pub book_index: u64,
    #[serde(default)]
    pub progress: WorkloadProgress,
}

impl Workload {
    /// Whether dev and base play with different thread counts.
    pub fn has_thread_odds(&self) -> bool {
        self.dev.threads() != self.base.threads()
    }

    pub fn max_engine_threads(&self) -> u32 {
        self.dev.threads().max(self.base.threads())
    }

    pub fn engine(&self, side: Side) -> &EngineSpec {
        match side {
            Side::Dev => &self.dev,
            Side::Base => &self.base,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_syzygy_requirement_round_trip() {
        for text in ["DISABLED", "OPTIONAL", "5-MAN"] {
            let parsed: SyzygyRequirement = text.parse().unwrap();
            assert_eq!(parsed.to_string(), text);
        }
        assert_eq!("6-man".parse::<SyzygyRequirement>().unwrap(), SyzygyRequirement::Pieces(6));
        assert!("SOMETIMES".parse::<SyzygyRequirement>().is_err());
    }

    #[test]
    fn test_fischer_random_books() {
        let book = |name: &str| BookSpec {
            name: name.to_string(),
            sha: String::new(),
            source: String::new(),
        };
        assert!(book("DFRC_openings.epd").is_fischer_random());
        assert!(book("chess960.epd").is_fischer_random());
        assert!(!book("UHO_4060_v2.epd").is_fischer_random());
    }

    #[test]
    fn test_mode_is_tagged_by_type() {
        let json = r#"{"type":"SPRT","elo0":0.0,"elo1":5.0,"alpha":0.05,"beta":0.05}"#;
        let mode: WorkloadMode = serde_json::from_str(json).unwrap();
        assert!(matches!(mode, WorkloadMode::Sprt { elo1, .. } if elo1 == 5.0));

        let json = r#"{"type":"FIXED_GAMES","max_games":1000}"#;
        let mode: WorkloadMode = serde_json::from_str(json).unwrap();
        assert_eq!(mode, WorkloadMode::FixedGames { max_games: 1000 });
    }

    #[test]
    fn test_spsa_parameter_initial_values() {
        let schedule = SpsaSchedule {
            iterations: 1000,
            pairs_per: 8,
            a_ratio: 0.1,
            alpha: 0.602,
            gamma: 0.101,
        };
        let param = SpsaParameter::new("Aspiration", false, 12.0, 4.0, 40.0, 2.0, 0.002, &schedule);
        assert_eq!(param.value, 12.0);
        assert!((param.c_value - 2.0 * 1000f64.powf(0.101)).abs() < 1e-9);
        let a_end = 0.002 * 4.0;
        assert!((param.a_value - a_end * 1100f64.powf(0.602)).abs() < 1e-9);
    }
}
