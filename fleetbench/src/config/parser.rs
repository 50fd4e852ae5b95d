//! INI parsing logic for converting `Ini` → `ConfigFile`.
//!
//! This module contains the `parse_ini()` function and its helpers.
//! It is the single place where INI key names are mapped to struct fields.

use std::path::PathBuf;
use std::str::FromStr;

use ini::{Ini, Properties};

use super::file::ConfigFileError;
use super::settings::ConfigFile;

/// Parse an `Ini` object into a `ConfigFile`.
///
/// Starts from `ConfigFile::default()` and overlays any values found in the INI.
pub(super) fn parse_ini(ini: &Ini) -> Result<ConfigFile, ConfigFileError> {
    let mut config = ConfigFile::default();

    // [server] section
    if let Some(section) = ini.section(Some("server")) {
        config.server.url = non_empty(section, "url");
        config.server.username = non_empty(section, "username");
        config.server.password = non_empty(section, "password");

        if let Some(url) = &config.server.url {
            if !url.starts_with("http://") && !url.starts_with("https://") {
                return Err(invalid("server", "url", url, "must start with http:// or https://"));
            }
        }
    }

    // [worker] section
    if let Some(section) = ini.section(Some("worker")) {
        if let Some(v) = section.get("threads") {
            let v = v.trim();
            if !v.is_empty() {
                let threads: u32 = parse_number(v, "worker", "threads")?;
                if threads == 0 {
                    return Err(invalid("worker", "threads", v, "must be at least 1"));
                }
                config.machine.threads = Some(threads);
            }
        }
        if let Some(v) = section.get("sockets") {
            let sockets: u32 = parse_number(v, "worker", "sockets")?;
            if sockets == 0 {
                return Err(invalid("worker", "sockets", v, "must be at least 1"));
            }
            config.machine.sockets = sockets;
        }
        config.machine.identity = non_empty(section, "identity");
        config.machine.syzygy_path = non_empty(section, "syzygy_path");
        if let Some(v) = section.get("fleet") {
            config.machine.fleet = parse_bool(v);
        }
        if let Some(v) = section.get("engine_preferences") {
            config.machine.engine_preferences = v
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(String::from)
                .collect();
        }
    }

    // [timing] section
    if let Some(section) = ini.section(Some("timing")) {
        let timing = &mut config.timing;
        for (key, slot) in [
            ("http_timeout_secs", &mut timing.http_timeout_secs),
            ("error_backoff_secs", &mut timing.error_backoff_secs),
            ("workload_backoff_secs", &mut timing.workload_backoff_secs),
            ("report_interval_secs", &mut timing.report_interval_secs),
            ("bench_timeout_secs", &mut timing.bench_timeout_secs),
            ("result_poll_ms", &mut timing.result_poll_ms),
        ] {
            if let Some(v) = section.get(key) {
                let parsed: u64 = parse_number(v, "timing", key)?;
                if parsed == 0 {
                    return Err(invalid("timing", key, v, "must be a positive integer"));
                }
                *slot = parsed;
            }
        }
    }

    // [cache] section
    if let Some(section) = ini.section(Some("cache")) {
        if let Some(v) = section.get("directory") {
            let v = v.trim();
            if !v.is_empty() {
                config.cache.directory = expand_tilde(v);
            }
        }
        if let Some(v) = section.get("pgn_max_age_days") {
            config.cache.pgn_max_age_days = parse_number(v, "cache", "pgn_max_age_days")?;
        }
        if let Some(v) = section.get("engine_max_age_days") {
            config.cache.engine_max_age_days = parse_number(v, "cache", "engine_max_age_days")?;
        }
        if let Some(v) = section.get("network_max_age_days") {
            config.cache.network_max_age_days = parse_number(v, "cache", "network_max_age_days")?;
        }
    }

    // [logging] section
    if let Some(section) = ini.section(Some("logging")) {
        if let Some(v) = section.get("file") {
            let v = v.trim();
            if !v.is_empty() {
                config.logging.file = expand_tilde(v);
            }
        }
    }

    Ok(config)
}

fn non_empty(section: &Properties, key: &str) -> Option<String> {
    section
        .get(key)
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(String::from)
}

fn parse_number<T: FromStr>(value: &str, section: &str, key: &str) -> Result<T, ConfigFileError> {
    value
        .trim()
        .parse()
        .map_err(|_| invalid(section, key, value, "must be a number"))
}

fn invalid(section: &str, key: &str, value: &str, reason: &str) -> ConfigFileError {
    ConfigFileError::InvalidValue {
        section: section.to_string(),
        key: key.to_string(),
        value: value.to_string(),
        reason: reason.to_string(),
    }
}

/// Parse a boolean value from INI (true/false, 1/0, yes/no, on/off).
pub(super) fn parse_bool(value: &str) -> bool {
    let v = value.trim().to_lowercase();
    v == "true" || v == "1" || v == "yes" || v == "on"
}

/// Expand ~ to home directory in paths.
pub(super) fn expand_tilde(path: &str) -> PathBuf {
    if let Some(stripped) = path.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(stripped);
        }
    }
    PathBuf::from(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::defaults::*;
    use tempfile::TempDir;

    fn load(content: &str) -> Result<ConfigFile, ConfigFileError> {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("config.ini");
        std::fs::write(&config_path, content).unwrap();
        ConfigFile::load_from(&config_path)
    }

    #[test]
    fn test_server_section() {
        let config = load(
            r#"
[server]
url = https://bench.example.org
username = alice
password =
"#,
        )
        .unwrap();

        assert_eq!(config.server.url.as_deref(), Some("https://bench.example.org"));
        assert_eq!(config.server.username.as_deref(), Some("alice"));
        assert!(config.server.password.is_none());
    }

    #[test]
    fn test_invalid_server_url() {
        let err = load("[server]\nurl = bench.example.org\n").unwrap_err();
        assert!(err.to_string().contains("server.url"));
    }

    #[test]
    fn test_worker_section() {
        let config = load(
            r#"
[worker]
threads = 16
sockets = 2
fleet = yes
engine_preferences = Ethereal, Stockfish ,
"#,
        )
        .unwrap();

        assert_eq!(config.machine.threads, Some(16));
        assert_eq!(config.machine.sockets, 2);
        assert!(config.machine.fleet);
        assert_eq!(config.machine.engine_preferences, vec!["Ethereal", "Stockfish"]);
    }

    #[test]
    fn test_zero_threads_rejected() {
        let err = load("[worker]\nthreads = 0\n").unwrap_err();
        assert!(err.to_string().contains("threads"));
    }

    #[test]
    fn test_invalid_timing_value() {
        let err = load("[timing]\nreport_interval_secs = soon\n").unwrap_err();
        assert!(err.to_string().contains("report_interval_secs"));
    }

    #[test]
    fn test_unknown_section_ignored() {
        let config = load("[scheduler]\nstickiness_threshold = 1.5\n").unwrap();
        assert_eq!(config, ConfigFile::default());
    }

    #[test]
    fn test_partial_config() {
        let config = load("[timing]\nreport_interval_secs = 10\n").unwrap();

        assert_eq!(config.timing.report_interval_secs, 10);
        assert_eq!(config.timing.error_backoff_secs, DEFAULT_ERROR_BACKOFF_SECS);
        assert_eq!(config.cache.pgn_max_age_days, DEFAULT_PGN_MAX_AGE_DAYS);
    }

    #[test]
    fn test_parse_bool() {
        assert!(parse_bool("true"));
        assert!(parse_bool(" ON "));
        assert!(parse_bool("1"));
        assert!(!parse_bool("false"));
        assert!(!parse_bool("nope"));
    }

    #[test]
    fn test_expand_tilde() {
        let path = expand_tilde("~/test/path");
        if let Some(home) = dirs::home_dir() {
            assert_eq!(path, home.join("test/path"));
        }

        // Non-tilde paths should be unchanged
        let path = expand_tilde("/absolute/path");
        assert_eq!(path, PathBuf::from("/absolute/path"));
    }
}
