//! Logging infrastructure for the worker.
//!
//! Provides structured logging with file output and optional console output:
//! - Writes to the configured log file (cleared on session start)
//! - Also prints to stdout unless running quietly
//! - Configurable via RUST_LOG environment variable

use std::fs;
use std::io;
use std::path::Path;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

/// Guard that must be kept alive for the duration of logging.
///
/// Dropping this guard will flush and close the log file writer.
pub struct LoggingGuard {
    _file_guard: WorkerGuard,
}

/// Initialize logging system.
///
/// Creates the parent directory of `log_path` if needed, clears the previous
/// log and sets up output to the file and, when `console` is set, to stdout.
/// Without `RUST_LOG` the level is `info`, or `debug` when `verbose`.
///
/// # Errors
///
/// Returns error if the log directory cannot be created or the file cannot be cleared
pub fn init_logging(
    log_path: &Path,
    console: bool,
    verbose: bool,
) -> Result<LoggingGuard, io::Error> {
    let (log_dir, log_file) = split_log_path(log_path)?;
    fs::create_dir_all(log_dir)?;
    fs::write(log_path, "")?;

    let file_appender = tracing_appender::rolling::never(log_dir, log_file);
    let (non_blocking_file, file_guard) = tracing_appender::non_blocking(file_appender);

    let file_layer = tracing_subscriber::fmt::layer()
        .with_writer(non_blocking_file)
        .with_ansi(false)
        .with_span_events(FmtSpan::CLOSE)
        .compact();

    let stdout_layer = console.then(|| {
        tracing_subscriber::fmt::layer()
            .with_writer(io::stdout)
            .with_ansi(true)
            .compact()
    });

    let default_level = if verbose { "debug" } else { "info" };
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(file_layer)
        .with(stdout_layer)
        .init();

    Ok(LoggingGuard {
        _file_guard: file_guard,
    })
}

fn split_log_path(log_path: &Path) -> Result<(&Path, &std::ffi::OsStr), io::Error> {
    let file = log_path.file_name().ok_or_else(|| {
        io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("log path has no file name: {}", log_path.display()),
        )
    })?;
    let dir = log_path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    Ok((dir, file))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_split_log_path() {
        let (dir, file) = split_log_path(Path::new("/tmp/logs/worker.log")).unwrap();
        assert_eq!(dir, Path::new("/tmp/logs"));
        assert_eq!(file, "worker.log");
    }

    #[test]
    fn test_split_bare_file_name() {
        let (dir, file) = split_log_path(Path::new("worker.log")).unwrap();
        assert_eq!(dir, Path::new("."));
        assert_eq!(file, "worker.log");
    }

    #[test]
    fn test_split_rejects_directory_only() {
        assert!(split_log_path(&PathBuf::from("/")).is_err());
    }

    #[test]
    fn test_guard_structure() {
        use tracing_appender::non_blocking::NonBlocking;

        let (non_blocking, guard) = NonBlocking::new(std::io::sink());
        drop(non_blocking);

        let _logging_guard = LoggingGuard { _file_guard: guard };
    }

    // Actual log output needs an integration test: the global subscriber can
    // only be installed once per process.
}
