//! Post-match diagnostics and PGN upload.

use std::path::PathBuf;

use tracing::{info, warn};

use super::command::pgn_path;
use super::settings::WorkDirs;
use crate::pgn::{compress_pgns, read_pgn_file};
use crate::protocol::{ServerClient, Session};
use crate::scheduler::Assignment;

/// What teardown sent to the server.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TeardownSummary {
    pub errors_reported: usize,
    pub pgn_uploaded: bool,
}

/// Reports abnormal game terminations and uploads PGNs when requested.
///
/// Every call is best effort; failures are logged.
pub async fn teardown<C: ServerClient>(
    client: &C,
    session: &Session,
    assignment: &Assignment,
    dirs: &WorkDirs,
    timestamp: i64,
    scale_factor: f64,
) -> TeardownSummary {
    let mut summary = TeardownSummary::default();
    let paths: Vec<PathBuf> = (0..assignment.distribution.runner_count as usize)
        .map(|runner| dirs.root().join(pgn_path(assignment, timestamp, runner)))
        .collect();

    for path in &paths {
        let games = match read_pgn_file(path) {
            Ok(games) => games,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Failed to read PGN");
                continue;
            }
        };
        for game in games {
            let Some(error) = game.termination_error() else { continue };
            match client
                .submit_error(session, assignment, None, error, &game.pretty())
                .await
            {
                Ok(()) => summary.errors_reported += 1,
                Err(e) => warn!(error = %e, "Failed to report game error"),
            }
        }
    }

    if assignment.upload_pgns {
        let to_compress = paths.clone();
        let compressed =
            tokio::task::spawn_blocking(move || compress_pgns(&to_compress, scale_factor)).await;
        match compressed {
            Ok(Ok(bytes)) => match client.submit_pgn(session, assignment, bytes).await {
                Ok(()) => summary.pgn_uploaded = true,
                Err(e) => warn!(error = %e, "Failed to upload PGNs"),
            },
            Ok(Err(e)) => warn!(error = %e, "Failed to compress PGNs"),
            Err(e) => warn!(error = %e, "PGN compression task failed"),
        }
    }

    info!(
        workload_id = assignment.workload_id,
        errors = summary.errors_reported,
        uploaded = summary.pgn_uploaded,
        "Teardown complete"
    );
    summary
}
