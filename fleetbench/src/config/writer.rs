//! INI serialization logic for converting `ConfigFile` → INI string.
//!
//! This module contains the `to_config_string()` function that produces
//! the commented INI representation written to `config.ini`.

use std::path::Path;

use super::settings::ConfigFile;

/// Convert a `ConfigFile` to a commented INI string for saving.
pub(super) fn to_config_string(config: &ConfigFile) -> String {
    let url = config.server.url.as_deref().unwrap_or("");
    let username = config.server.username.as_deref().unwrap_or("");
    let password = config.server.password.as_deref().unwrap_or("");
    let threads = config
        .machine
        .threads
        .map(|t| t.to_string())
        .unwrap_or_default();
    let identity = config.machine.identity.as_deref().unwrap_or("");
    let syzygy_path = config.machine.syzygy_path.as_deref().unwrap_or("");
    let fleet = if config.machine.fleet { "true" } else { "false" };
    let engine_preferences = config.machine.engine_preferences.join(", ");

    format!(
        r#"[server]
; Base URL of the testing server, e.g. https://bench.example.org
url = {}
; Account used to register this machine
username = {}
; Leave empty to supply it with --password or FLEETBENCH_PASSWORD
password = {}

[worker]
; Threads dedicated to games (empty = all logical CPUs)
threads = {}
; Number of match-runner copies, usually the CPU socket count
sockets = {}
; Name shown on the server instead of the machine id (optional)
identity = {}
; Syzygy tablebase directories, ':' separated (';' on Windows)
syzygy_path = {}
; Exit when the server has no work instead of waiting
fleet = {}
; Comma separated engines to prefer when choosing work
engine_preferences = {}

[timing]
; HTTP request timeout
http_timeout_secs = {}
; Wait after an unexpected error before trying again
error_backoff_secs = {}
; Wait before asking again when no work is available
workload_backoff_secs = {}
; Minimum spacing between result reports and heartbeats
report_interval_secs = {}
; Maximum duration of one engine bench run
bench_timeout_secs = {}
; How long the reporting loop waits for new results (milliseconds)
result_poll_ms = {}

[cache]
; Working directory holding Books/, Engines/, Networks/ and PGNs/
directory = {}
; Files older than these ages are removed before each request
pgn_max_age_days = {}
engine_max_age_days = {}
network_max_age_days = {}

[logging]
file = {}
"#,
        url,
        username,
        password,
        threads,
        config.machine.sockets,
        identity,
        syzygy_path,
        fleet,
        engine_preferences,
        config.timing.http_timeout_secs,
        config.timing.error_backoff_secs,
        config.timing.workload_backoff_secs,
        config.timing.report_interval_secs,
        config.timing.bench_timeout_secs,
        config.timing.result_poll_ms,
        path_to_string(&config.cache.directory),
        config.cache.pgn_max_age_days,
        config.cache.engine_max_age_days,
        config.cache.network_max_age_days,
        path_to_string(&config.logging.file),
    )
}

/// Convert path to string, using ~ for home directory.
fn path_to_string(path: &Path) -> String {
    if let Some(home) = dirs::home_dir() {
        if let Ok(stripped) = path.strip_prefix(&home) {
            return format!("~/{}", stripped.display());
        }
    }
    path.display().to_string()
}
