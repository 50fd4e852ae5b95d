//! Time controls and their speed-normalized runner flags.

use std::fmt;
use std::str::FromStr;
use std::sync::OnceLock;

use regex::Regex;
use thiserror::Error;

/// Extra milliseconds a runner tolerates before flagging a time loss.
const TIME_MARGIN_MS: u32 = 250;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("Unable to parse time control '{0}'")]
pub struct TimeControlError(pub String);

/// A parsed time control.
///
/// Accepted forms:
///
/// | Input | Variant |
/// |---|---|
/// | `N=25000`, `nodes=25000` | [`TimeControl::FixedNodes`] |
/// | `D=12`, `depth=12` | [`TimeControl::FixedDepth`] |
/// | `MT=500`, `movetime=500` | [`TimeControl::MoveTime`] (milliseconds) |
/// | `40/10+0.1` | [`TimeControl::Cyclic`] |
/// | `10+0.1`, `60` | [`TimeControl::Fischer`] |
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TimeControl {
    FixedNodes(u64),
    FixedDepth(u64),
    MoveTime(u64),
    Cyclic { moves: u32, base: f64, increment: f64 },
    Fischer { base: f64, increment: f64 },
}

impl TimeControl {
    /// Scales a clock-based control by `factor`; node and depth limits are unchanged.
    pub fn scaled(&self, factor: f64) -> TimeControl {
        match *self {
            TimeControl::FixedNodes(_) | TimeControl::FixedDepth(_) => *self,
            TimeControl::MoveTime(ms) => TimeControl::MoveTime((ms as f64 * factor).round() as u64),
            TimeControl::Cyclic {
                moves,
                base,
                increment,
            } => TimeControl::Cyclic {
                moves,
                base: base * factor,
                increment: increment * factor,
            },
            TimeControl::Fischer { base, increment } => TimeControl::Fischer {
                base: base * factor,
                increment: increment * factor,
            },
        }
    }

    /// Match-runner flags for this control after scaling by `factor`.
    pub fn runner_flags(&self, factor: f64) -> String {
        match *self {
            TimeControl::FixedNodes(nodes) => format!("tc=inf nodes={}", nodes),
            TimeControl::FixedDepth(depth) => format!("tc=inf depth={}", depth),
            TimeControl::MoveTime(ms) => format!(
                "st={:.2} timemargin={}",
                ms as f64 * factor / 1000.0,
                TIME_MARGIN_MS
            ),
            TimeControl::Cyclic {
                moves,
                base,
                increment,
            } => format!(
                "tc={}/{:.2}+{:.2} timemargin={}",
                moves,
                base * factor,
                increment * factor,
                TIME_MARGIN_MS
            ),
            TimeControl::Fischer { base, increment } => format!(
                "tc={:.2}+{:.2} timemargin={}",
                base * factor,
                increment * factor,
                TIME_MARGIN_MS
            ),
        }
    }
}

fn fixed_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"(?i)^(N|D|MT|NODES|DEPTH|MOVETIME)=(\d+)$").expect("Valid regex"))
}

fn clock_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^(?:(\d+)/)?(\d*\.?\d+)(?:\+(\d*\.?\d+))?$").expect("Valid regex")
    })
}

impl FromStr for TimeControl {
    type Err = TimeControlError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let err = || TimeControlError(s.to_string());
        let trimmed = s.trim();

        if let Some(caps) = fixed_pattern().captures(trimmed) {
            let value: u64 = caps[2].parse().map_err(|_| err())?;
            return match caps[1].to_ascii_uppercase().as_str() {
                "N" | "NODES" => Ok(TimeControl::FixedNodes(value)),
                "D" | "DEPTH" => Ok(TimeControl::FixedDepth(value)),
                _ => Ok(TimeControl::MoveTime(value)),
            };
        }

        let caps = clock_pattern().captures(trimmed).ok_or_else(err)?;

        let base: f64 = caps[2].parse().map_err(|_| err())?;
        let increment: f64 = match caps.get(3) {
            Some(m) => m.as_str().parse().map_err(|_| err())?,
            None => 0.0,
        };

        match caps.get(1) {
            Some(m) => Ok(TimeControl::Cyclic {
                moves: m.as_str().parse().map_err(|_| err())?,
                base,
                increment,
            }),
            None => Ok(TimeControl::Fischer { base, increment }),
        }
    }
}

impl fmt::Display for TimeControl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TimeControl::FixedNodes(n) => write!(f, "N={}", n),
            TimeControl::FixedDepth(d) => write!(f, "D={}", d),
            TimeControl::MoveTime(ms) => write!(f, "MT={}", ms),
            TimeControl::Cyclic {
                moves,
                base,
                increment,
            } => write!(f, "{}/{:.1}+{:.2}", moves, base, increment),
            TimeControl::Fischer { base, increment } => write!(f, "{:.1}+{:.2}", base, increment),
        }
    }
}

impl serde::Serialize for TimeControl {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> serde::Deserialize<'de> for TimeControl {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_fixed_controls() {
        assert_eq!("N=25000".parse::<TimeControl>().unwrap(), TimeControl::FixedNodes(25000));
        assert_eq!("nodes=100".parse::<TimeControl>().unwrap(), TimeControl::FixedNodes(100));
        assert_eq!("depth=12".parse::<TimeControl>().unwrap(), TimeControl::FixedDepth(12));
        assert_eq!("MT=500".parse::<TimeControl>().unwrap(), TimeControl::MoveTime(500));
    }

    #[test]
    fn test_parse_clock_controls() {
        assert_eq!(
            "10+0.1".parse::<TimeControl>().unwrap(),
            TimeControl::Fischer {
                base: 10.0,
                increment: 0.1
            }
        );
        assert_eq!(
            "40/60+0.6".parse::<TimeControl>().unwrap(),
            TimeControl::Cyclic {
                moves: 40,
                base: 60.0,
                increment: 0.6
            }
        );
        assert_eq!(
            "8".parse::<TimeControl>().unwrap(),
            TimeControl::Fischer {
                base: 8.0,
                increment: 0.0
            }
        );
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!("fast".parse::<TimeControl>().is_err());
        assert!("".parse::<TimeControl>().is_err());
        assert!("10+".parse::<TimeControl>().is_err());
    }

    #[test]
    fn test_normalized_display() {
        let tc: TimeControl = "10+0.1".parse().unwrap();
        assert_eq!(tc.to_string(), "10.0+0.10");
        let tc: TimeControl = "nodes=5000".parse().unwrap();
        assert_eq!(tc.to_string(), "N=5000");
        let tc: TimeControl = "40/60".parse().unwrap();
        assert_eq!(tc.to_string(), "40/60.0+0.00");
    }

    #[test]
    fn test_scaling_halves_base_and_increment() {
        let tc: TimeControl = "10+0.1".parse().unwrap();
        match tc.scaled(0.5) {
            TimeControl::Fischer { base, increment } => {
                assert!((base - 5.0).abs() < 1e-12);
                assert!((increment - 0.05).abs() < 1e-12);
            }
            other => panic!("unexpected {:?}", other),
        }
        assert_eq!(tc.runner_flags(0.5), "tc=5.00+0.05 timemargin=250");
    }

    #[test]
    fn test_fixed_limits_are_never_scaled() {
        let tc = TimeControl::FixedNodes(25000);
        assert_eq!(tc.scaled(0.5), tc);
        assert_eq!(tc.runner_flags(0.5), "tc=inf nodes=25000");
        assert_eq!(TimeControl::FixedDepth(9).runner_flags(3.0), "tc=inf depth=9");
    }

    #[test]
    fn test_movetime_and_cyclic_flags() {
        assert_eq!(TimeControl::MoveTime(1000).runner_flags(1.5), "st=1.50 timemargin=250");
        let tc: TimeControl = "40/60+0.6".parse().unwrap();
        assert_eq!(tc.runner_flags(0.5), "tc=40/30.00+0.30 timemargin=250");
    }

    #[test]
    fn test_serde_as_string() {
        let tc: TimeControl = serde_json::from_str("\"5+0.05\"").unwrap();
        assert_eq!(serde_json::to_string(&tc).unwrap(), "\"5.0+0.05\"");
    }
}
