//! The worker's outer loop: register, request work, run attempts.

use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use super::cleanup::evict_stale_files;
use super::context::WorkerContext;
use super::coordinator::WorkloadAttempt;
use super::error::WorkerError;
use super::identity::{clear_machine_id, load_machine_id, save_machine_id};
use super::reporter::ReportOutcome;
use crate::protocol::{ProtocolError, ServerClient, Session};
use crate::workload::WorkloadId;

/// Why the daemon returned without error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DaemonExit {
    /// The cancellation token fired (Ctrl-C).
    Cancelled,
    /// The exit marker file appeared.
    ExitFile,
    /// Fleet mode and the server had no work.
    NoWork,
}

enum SessionEnd {
    Exit(DaemonExit),
    Reregister,
}

/// Runs workload attempts until told to stop.
pub struct Daemon<'a, C> {
    client: &'a C,
    context: &'a WorkerContext,
}

impl<'a, C: ServerClient> Daemon<'a, C> {
    pub fn new(client: &'a C, context: &'a WorkerContext) -> Self {
        Self { client, context }
    }

    /// Loops until cancellation, the exit file, fleet idleness or a fatal
    /// error.
    ///
    /// Fatal errors are rejected credentials and an outdated client
    /// version. Everything else is logged and retried.
    pub async fn run(&self, cancel: &CancellationToken) -> Result<DaemonExit, WorkerError> {
        if let Err(e) = self.context.dirs.create_all() {
            error!(root = %self.context.dirs.root().display(), error = %e, "Failed to create work directories");
            return Err(e.into());
        }

        loop {
            let Some(session) = self.register(cancel).await? else {
                return Ok(DaemonExit::Cancelled);
            };
            match self.serve(&session, cancel).await? {
                SessionEnd::Exit(exit) => return Ok(exit),
                SessionEnd::Reregister => info!("Registering again"),
            }
        }
    }

    /// Registers until the server accepts; `None` when cancelled.
    async fn register(&self, cancel: &CancellationToken) -> Result<Option<Session>, WorkerError> {
        let machine_file = self.context.dirs.machine_file();
        loop {
            let machine_id = load_machine_id(&machine_file);
            match self.client.register(&self.context.machine_info(machine_id)).await {
                Ok(session) => {
                    info!(machine_id = session.machine_id, "Registered with server");
                    if let Err(e) = save_machine_id(&machine_file, session.machine_id) {
                        warn!(path = %machine_file.display(), error = %e, "Failed to save machine id");
                    }
                    return Ok(Some(session));
                }
                Err(ProtocolError::BadMachineId) if machine_id.is_some() => {
                    warn!(machine_id, "Server rejected saved machine id");
                    clear_machine_id(&machine_file)?;
                }
                Err(e) if e.is_transient() || e == ProtocolError::BadMachineId => {
                    warn!(error = %e, "Registration failed");
                    if !backoff(self.context.settings.error_backoff(), cancel).await {
                        return Ok(None);
                    }
                }
                Err(e) => {
                    error!(error = %e, "Registration rejected");
                    return Err(e.into());
                }
            }
        }
    }

    /// Requests and runs workloads with one session.
    async fn serve(&self, session: &Session, cancel: &CancellationToken) -> Result<SessionEnd, WorkerError> {
        let settings = &self.context.settings;
        let mut blacklist: Vec<WorkloadId> = Vec::new();

        loop {
            if cancel.is_cancelled() {
                return Ok(SessionEnd::Exit(DaemonExit::Cancelled));
            }
            if self.context.dirs.exit_requested() {
                info!("Exit file found");
                return Ok(SessionEnd::Exit(DaemonExit::ExitFile));
            }

            let dirs = self.context.dirs.clone();
            let cache = settings.cache.clone();
            if let Err(e) = tokio::task::spawn_blocking(move || evict_stale_files(&dirs, &cache)).await {
                warn!(error = %e, "Cache eviction task failed");
            }

            let assignment = match self.client.request_workload(session, &blacklist).await {
                Ok(Some(assignment)) => assignment,
                Ok(None) => {
                    if settings.fleet {
                        info!("No work available, exiting (fleet mode)");
                        return Ok(SessionEnd::Exit(DaemonExit::NoWork));
                    }
                    info!(retry_secs = settings.workload_backoff().as_secs(), "No work available");
                    if !backoff(settings.workload_backoff(), cancel).await {
                        return Ok(SessionEnd::Exit(DaemonExit::Cancelled));
                    }
                    continue;
                }
                Err(ProtocolError::BadMachineId) => return Ok(SessionEnd::Reregister),
                Err(e) if e.is_transient() => {
                    warn!(error = %e, "Workload request failed");
                    if !backoff(settings.error_backoff(), cancel).await {
                        return Ok(SessionEnd::Exit(DaemonExit::Cancelled));
                    }
                    continue;
                }
                Err(e) => return Err(e.into()),
            };

            let workload_id = assignment.workload_id;
            let mut attempt = WorkloadAttempt::new(self.client, session, self.context, &assignment);
            match attempt.run(cancel).await {
                Ok(summary) => match summary.outcome {
                    ReportOutcome::ExitRequested => return Ok(SessionEnd::Exit(DaemonExit::ExitFile)),
                    ReportOutcome::Cancelled => return Ok(SessionEnd::Exit(DaemonExit::Cancelled)),
                    ReportOutcome::Finished | ReportOutcome::Stopped => {
                        info!(workload_id, outcome = ?summary.outcome, "Workload attempt complete");
                    }
                },
                Err(e) if e.is_fatal() => return Err(e),
                Err(WorkerError::Protocol(ProtocolError::BadMachineId)) => return Ok(SessionEnd::Reregister),
                Err(e) if e.is_attempt_local() => {
                    warn!(workload_id, error = %e, "Workload attempt failed, blacklisting");
                    blacklist.push(workload_id);
                }
                Err(e) => {
                    error!(workload_id, error = %e, "Unexpected worker error");
                    if !backoff(settings.error_backoff(), cancel).await {
                        return Ok(SessionEnd::Exit(DaemonExit::Cancelled));
                    }
                }
            }
        }
    }
}

/// Sleeps for `delay`; false when cancelled first.
async fn backoff(delay: Duration, cancel: &CancellationToken) -> bool {
    tokio::select! {
        biased;
        _ = cancel.cancelled() => false,
        _ = tokio::time::sleep(delay) => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ConfigFile;
    use crate::test_support::{sample_assignment, sample_workload, Call, FakeServer};
    use crate::worker::settings::WorkerSettings;
    use crate::worker::system::CpuInfo;

    fn context(root: &std::path::Path, fleet: bool) -> WorkerContext {
        let mut config = ConfigFile::default();
        config.cache.directory = root.to_path_buf();
        config.machine.fleet = fleet;
        WorkerContext::new(WorkerSettings::from_config(&config), CpuInfo::default(), 0)
    }

    fn requests(server: &FakeServer) -> Vec<Vec<WorkloadId>> {
        server
            .calls()
            .into_iter()
            .filter_map(|c| match c {
                Call::RequestWorkload(blacklist) => Some(blacklist),
                _ => None,
            })
            .collect()
    }

    #[tokio::test(start_paused = true)]
    async fn test_fleet_exits_without_work() {
        let temp_dir = tempfile::TempDir::new().unwrap();
        let context = context(temp_dir.path(), true);
        let server = FakeServer::default();

        let exit = Daemon::new(&server, &context)
            .run(&CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(exit, DaemonExit::NoWork);
        assert_eq!(server.calls()[0], Call::Register);
        assert_eq!(requests(&server), vec![Vec::<WorkloadId>::new()]);
        assert_eq!(load_machine_id(&context.dirs.machine_file()), Some(1));
    }

    #[tokio::test(start_paused = true)]
    async fn test_rejected_machine_id_is_cleared() {
        let temp_dir = tempfile::TempDir::new().unwrap();
        let context = context(temp_dir.path(), true);
        context.dirs.create_all().unwrap();
        save_machine_id(&context.dirs.machine_file(), 99).unwrap();

        let server = FakeServer::default();
        server
            .registrations
            .lock()
            .unwrap()
            .push_back(Err(ProtocolError::BadMachineId));
        server.registrations.lock().unwrap().push_back(Ok(Session {
            machine_id: 5,
            secret: "fresh".to_string(),
        }));

        Daemon::new(&server, &context)
            .run(&CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(load_machine_id(&context.dirs.machine_file()), Some(5));
    }

    #[tokio::test(start_paused = true)]
    async fn test_bad_credentials_are_fatal() {
        let temp_dir = tempfile::TempDir::new().unwrap();
        let context = context(temp_dir.path(), false);
        let server = FakeServer::default();
        server
            .registrations
            .lock()
            .unwrap()
            .push_back(Err(ProtocolError::BadCredentials));

        let err = Daemon::new(&server, &context)
            .run(&CancellationToken::new())
            .await
            .unwrap_err();
        assert!(err.is_fatal());
    }

    #[tokio::test(start_paused = true)]
    async fn test_transient_registration_failure_retries() {
        let temp_dir = tempfile::TempDir::new().unwrap();
        let context = context(temp_dir.path(), true);
        let server = FakeServer::default();
        server
            .registrations
            .lock()
            .unwrap()
            .push_back(Err(ProtocolError::Http("connection refused".to_string())));

        let exit = Daemon::new(&server, &context)
            .run(&CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(exit, DaemonExit::NoWork);
        let registrations = server.calls().iter().filter(|c| **c == Call::Register).count();
        assert_eq!(registrations, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_attempt_is_blacklisted() {
        let temp_dir = tempfile::TempDir::new().unwrap();
        let context = context(temp_dir.path(), true);
        let server = FakeServer::default();
        let assignment = sample_assignment(&mut sample_workload(17));
        server.workloads.lock().unwrap().push_back(Ok(Some(assignment)));

        let exit = Daemon::new(&server, &context)
            .run(&CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(exit, DaemonExit::NoWork);
        assert_eq!(requests(&server), vec![vec![], vec![17]]);
        // The book download failed and was reported.
        assert!(server.calls().iter().any(|c| matches!(c, Call::Error { side: None, .. })));
    }

    #[tokio::test(start_paused = true)]
    async fn test_exit_file_stops_before_requesting() {
        let temp_dir = tempfile::TempDir::new().unwrap();
        let context = context(temp_dir.path(), false);
        context.dirs.create_all().unwrap();
        std::fs::write(context.dirs.exit_file(), b"").unwrap();
        let server = FakeServer::default();

        let exit = Daemon::new(&server, &context)
            .run(&CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(exit, DaemonExit::ExitFile);
        assert!(requests(&server).is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_idle_worker_backs_off_until_cancelled() {
        let temp_dir = tempfile::TempDir::new().unwrap();
        let context = context(temp_dir.path(), false);
        let server = FakeServer::default();
        let cancel = CancellationToken::new();

        let stopper = {
            let cancel = cancel.clone();
            async move {
                tokio::time::sleep(Duration::from_secs(65)).await;
                cancel.cancel();
            }
        };
        let daemon = Daemon::new(&server, &context);
        let (exit, _) = tokio::join!(daemon.run(&cancel), stopper);

        assert_eq!(exit.unwrap(), DaemonExit::Cancelled);
        // Requests at 0s, 30s and 60s.
        assert_eq!(requests(&server).len(), 3);
    }
}
