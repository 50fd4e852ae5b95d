//! Hardware and tablebase detection.

use std::collections::BTreeSet;
use std::path::Path;

use tracing::{debug, info};

use crate::config::num_cpus;

/// CPU flags relevant to artifact selection, in the spelling artifacts use.
pub const RELEVANT_CPU_FLAGS: &[&str] = &[
    "POPCNT",
    "BMI2",
    "SSSE3",
    "SSE41",
    "SSE42",
    "SSE4A",
    "AVX",
    "AVX2",
    "FMA",
    "AVX512VNNI",
    "AVX512BW",
    "AVX512DQ",
    "AVX512F",
];

/// Processor description used for registration and artifact choice.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CpuInfo {
    pub name: String,
    /// Relevant flags, normalised to uppercase without `_` or `.`.
    pub flags: Vec<String>,
    pub physical_cores: u32,
    pub logical_cores: u32,
}

/// Reads the processor description of this machine.
///
/// Only Linux exposes flags through `/proc/cpuinfo`; elsewhere the flag
/// list is empty and physical cores equal logical cores.
pub fn detect_cpu() -> CpuInfo {
    let logical = num_cpus() as u32;
    let mut info = match std::fs::read_to_string("/proc/cpuinfo") {
        Ok(text) => parse_cpuinfo(&text),
        Err(e) => {
            debug!(error = %e, "No /proc/cpuinfo, CPU flags unavailable");
            CpuInfo::default()
        }
    };

    info.logical_cores = logical;
    if info.physical_cores == 0 || info.physical_cores > logical {
        info.physical_cores = logical;
    }
    if info.name.is_empty() {
        info.name = "Unknown".to_string();
    }

    info!(
        cpu = %info.name,
        physical_cores = info.physical_cores,
        logical_cores = info.logical_cores,
        flags = %info.flags.join(" "),
        "Detected CPU"
    );
    info
}

/// Parses the contents of `/proc/cpuinfo`.
pub fn parse_cpuinfo(text: &str) -> CpuInfo {
    let mut name = String::new();
    let mut flags = BTreeSet::new();
    let mut cores = BTreeSet::new();
    let mut physical_id = String::new();

    for line in text.lines() {
        let Some((key, value)) = line.split_once(':') else {
            continue;
        };
        let value = value.trim();
        match key.trim() {
            "model name" if name.is_empty() => name = value.to_string(),
            "flags" if flags.is_empty() => {
                flags = value.split_whitespace().map(normalise_flag).collect();
            }
            "physical id" => physical_id = value.to_string(),
            "core id" => {
                cores.insert((physical_id.clone(), value.to_string()));
            }
            _ => {}
        }
    }

    CpuInfo {
        name,
        flags: RELEVANT_CPU_FLAGS
            .iter()
            .filter(|f| flags.contains(**f))
            .map(|f| f.to_string())
            .collect(),
        physical_cores: cores.len() as u32,
        logical_cores: 0,
    }
}

fn normalise_flag(flag: &str) -> String {
    flag.chars()
        .filter(|c| *c != '_' && *c != '.')
        .collect::<String>()
        .to_uppercase()
}

/// Operating system name as reported to the server.
pub fn os_name() -> &'static str {
    match std::env::consts::OS {
        "linux" => "Linux",
        "windows" => "Windows",
        "macos" => "Darwin",
        other => other,
    }
}

/// Splits a tablebase path list on `:` (`;` on Windows).
pub fn split_syzygy_paths(paths: &str) -> Vec<&str> {
    let separator = if cfg!(windows) { ';' } else { ':' };
    paths.split(separator).filter(|p| !p.is_empty()).collect()
}

/// Largest N for which every N-man (and smaller) `.rtbw` file is present.
///
/// Returns 0 when not even the 3-man set is complete.
pub fn detect_syzygy_max(paths: &str) -> u8 {
    let dirs = split_syzygy_paths(paths);
    let mut max = 0;
    for pieces in 3..=7u8 {
        let complete = tablebase_names(pieces)
            .iter()
            .all(|name| dirs.iter().any(|d| Path::new(d).join(format!("{}.rtbw", name)).is_file()));
        if !complete {
            break;
        }
        max = pieces;
    }
    info!(paths, syzygy_max = max, "Detected Syzygy tablebases");
    max
}

/// Canonical names of every N-man table, e.g. `KQvK` or `KRPvKR`.
///
/// The stronger side is listed first: more pieces, then stronger pieces.
pub fn tablebase_names(pieces: u8) -> Vec<String> {
    const ORDER: [char; 5] = ['Q', 'R', 'B', 'N', 'P'];

    fn multisets(len: usize, start: usize, prefix: &mut Vec<char>, out: &mut Vec<String>) {
        if prefix.len() == len {
            out.push(prefix.iter().collect());
            return;
        }
        for i in start..ORDER.len() {
            prefix.push(ORDER[i]);
            multisets(len, i, prefix, out);
            prefix.pop();
        }
    }

    // Piece strength ranks compared as digit strings, like 'KQ' > 'KR'
    fn rank(side: &str) -> String {
        side.chars()
            .map(|c| match c {
                'Q' => '8',
                'R' => '7',
                'B' => '6',
                'N' => '5',
                'P' => '4',
                _ => '9',
            })
            .collect()
    }

    let mut names = BTreeSet::new();
    let extra = pieces.saturating_sub(2) as usize;
    for strong_len in 0..=extra {
        let weak_len = extra - strong_len;
        let mut strong = Vec::new();
        let mut weak = Vec::new();
        multisets(strong_len, 0, &mut Vec::new(), &mut strong);
        multisets(weak_len, 0, &mut Vec::new(), &mut weak);
        for s in &strong {
            for w in &weak {
                let lhs = format!("K{}", s);
                let rhs = format!("K{}", w);
                let stronger = lhs.len() > rhs.len() || (lhs.len() == rhs.len() && rank(&lhs) >= rank(&rhs));
                if stronger && !(s.is_empty() && w.is_empty()) {
                    names.insert(format!("{}v{}", lhs, rhs));
                }
            }
        }
    }
    names.into_iter().collect()
}
