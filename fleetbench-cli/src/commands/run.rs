//! Run command - register with the server and play workloads until stopped.

use clap::Args;
use fleetbench::config::ConfigFile;
use fleetbench::protocol::HttpServerClient;
use fleetbench::worker::{Daemon, DaemonExit, WorkerContext, WorkerSettings};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::error::CliError;
use crate::runner::CliRunner;

/// Arguments for the run command.
///
/// Every flag overrides the matching config file value.
#[derive(Debug, Default, Args)]
pub struct RunArgs {
    /// Server URL, e.g. https://bench.example.org
    #[arg(long, env = "FLEETBENCH_SERVER")]
    pub server: Option<String>,

    /// Account username
    #[arg(short, long, env = "FLEETBENCH_USERNAME")]
    pub username: Option<String>,

    /// Account password
    #[arg(short, long, env = "FLEETBENCH_PASSWORD", hide_env_values = true)]
    pub password: Option<String>,

    /// Threads dedicated to games (default: all logical CPUs)
    #[arg(short = 't', long)]
    pub threads: Option<u32>,

    /// Match-runner copies, usually the CPU socket count
    #[arg(short = 'n', long)]
    pub sockets: Option<u32>,

    /// Pseudonym shown by the server instead of the machine id
    #[arg(short = 'I', long)]
    pub identity: Option<String>,

    /// Syzygy tablebase directories
    #[arg(short = 'S', long)]
    pub syzygy: Option<String>,

    /// Exit instead of idling when the server has no work
    #[arg(short = 'F', long)]
    pub fleet: bool,

    /// Engines this worker prefers, comma separated
    #[arg(short = 'E', long, value_delimiter = ',')]
    pub engines: Vec<String>,
}

/// Merges the config file with command-line overrides.
///
/// Fails when the server URL or credentials are missing after merging.
pub fn resolve_settings(config: &ConfigFile, args: &RunArgs) -> Result<WorkerSettings, CliError> {
    let mut settings = WorkerSettings::from_config(config);

    if let Some(server) = &args.server {
        settings.server_url = server.trim_end_matches('/').to_string();
    }
    if let Some(username) = &args.username {
        settings.username = username.clone();
    }
    if let Some(password) = &args.password {
        settings.password = password.clone();
    }
    if let Some(threads) = args.threads {
        if threads == 0 {
            return Err(CliError::Config("--threads must be at least 1".to_string()));
        }
        settings.threads = threads;
    }
    if let Some(sockets) = args.sockets {
        if sockets == 0 {
            return Err(CliError::Config("--sockets must be at least 1".to_string()));
        }
        settings.sockets = sockets;
    }
    if args.identity.is_some() {
        settings.identity = args.identity.clone();
    }
    if args.syzygy.is_some() {
        settings.syzygy_path = args.syzygy.clone();
    }
    settings.fleet |= args.fleet;
    if !args.engines.is_empty() {
        settings.engine_preferences = args.engines.iter().map(|e| e.trim().to_string()).collect();
    }

    for (value, name) in [
        (&settings.server_url, "server URL"),
        (&settings.username, "username"),
        (&settings.password, "password"),
    ] {
        if value.is_empty() {
            return Err(CliError::Config(format!("No {} configured", name)));
        }
    }

    Ok(settings)
}

/// Run the worker until Ctrl-C, the exit file, fleet idleness or a fatal
/// server rejection.
pub fn run(runner: CliRunner, args: RunArgs) -> Result<(), CliError> {
    runner.log_startup("run");
    let settings = resolve_settings(runner.config(), &args)?;

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(CliError::Runtime)?;

    runtime.block_on(async move {
        let context = WorkerContext::detect(settings);
        info!(
            server = %context.settings.server_url,
            threads = context.settings.threads,
            sockets = context.settings.sockets,
            cpu = %context.cpu.name,
            work_dir = %context.dirs.root().display(),
            "Starting worker"
        );

        let client = HttpServerClient::new(
            context.settings.server_url.clone(),
            context.settings.username.clone(),
            context.settings.password.clone(),
            context.settings.http_timeout(),
        )
        .map_err(CliError::Client)?;

        // Set up signal handler for graceful shutdown
        let cancel = CancellationToken::new();
        let signal_cancel = cancel.clone();
        tokio::spawn(async move {
            match tokio::signal::ctrl_c().await {
                Ok(()) => {
                    info!("Interrupt received, shutting down");
                    signal_cancel.cancel();
                }
                Err(e) => warn!(error = %e, "Failed to listen for Ctrl-C"),
            }
        });

        let exit = Daemon::new(&client, &context).run(&cancel).await?;
        match exit {
            DaemonExit::Cancelled => info!("Worker stopped"),
            DaemonExit::ExitFile => info!("Worker exited on request"),
            DaemonExit::NoWork => info!("No work left for this fleet worker"),
        }
        Ok::<(), CliError>(())
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn configured() -> ConfigFile {
        let mut config = ConfigFile::default();
        config.server.url = Some("https://bench.example.org".to_string());
        config.server.username = Some("alice".to_string());
        config.server.password = Some("hunter2".to_string());
        config.machine.threads = Some(8);
        config
    }

    #[test]
    fn test_config_values_used_without_flags() {
        let settings = resolve_settings(&configured(), &RunArgs::default()).unwrap();

        assert_eq!(settings.server_url, "https://bench.example.org");
        assert_eq!(settings.username, "alice");
        assert_eq!(settings.threads, 8);
        assert!(!settings.fleet);
    }

    #[test]
    fn test_flags_override_config() {
        let args = RunArgs {
            server: Some("http://localhost:8000/".to_string()),
            threads: Some(32),
            sockets: Some(2),
            identity: Some("rack-7".to_string()),
            fleet: true,
            engines: vec!["Ethereal".to_string(), " Stockfish".to_string()],
            ..Default::default()
        };

        let settings = resolve_settings(&configured(), &args).unwrap();

        assert_eq!(settings.server_url, "http://localhost:8000");
        assert_eq!(settings.threads, 32);
        assert_eq!(settings.sockets, 2);
        assert_eq!(settings.identity.as_deref(), Some("rack-7"));
        assert!(settings.fleet);
        assert_eq!(settings.engine_preferences, vec!["Ethereal", "Stockfish"]);
    }

    #[test]
    fn test_missing_credentials_rejected() {
        let mut config = configured();
        config.server.password = None;

        let err = resolve_settings(&config, &RunArgs::default()).unwrap_err();
        assert!(err.to_string().contains("password"));
    }

    #[test]
    fn test_zero_threads_rejected() {
        let args = RunArgs {
            threads: Some(0),
            ..Default::default()
        };
        assert!(resolve_settings(&configured(), &args).is_err());
    }
}
