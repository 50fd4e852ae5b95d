//! Age-based eviction of cached games, binaries and networks.

use std::path::Path;
use std::time::{Duration, SystemTime};

use tracing::{debug, info, warn};

use super::settings::WorkDirs;
use crate::config::CacheSettings;

const SECONDS_PER_DAY: u64 = 60 * 60 * 24;

/// Files removed by one eviction pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EvictionResult {
    pub pgns: usize,
    pub engines: usize,
    pub networks: usize,
}

impl EvictionResult {
    pub fn total(&self) -> usize {
        self.pgns + self.engines + self.networks
    }
}

/// Deletes cache entries older than their configured maximum age.
///
/// Runs before every workload request. Failures on single files are
/// logged and skipped.
pub fn evict_stale_files(dirs: &WorkDirs, cache: &CacheSettings) -> EvictionResult {
    evict_stale_files_at(dirs, cache, SystemTime::now())
}

fn evict_stale_files_at(dirs: &WorkDirs, cache: &CacheSettings, now: SystemTime) -> EvictionResult {
    let result = EvictionResult {
        pgns: evict_dir(&dirs.pgns(), days(cache.pgn_max_age_days), now),
        engines: evict_dir(&dirs.engines(), days(cache.engine_max_age_days), now),
        networks: evict_dir(&dirs.networks(), days(cache.network_max_age_days), now),
    };

    if result.total() > 0 {
        info!(
            pgns = result.pgns,
            engines = result.engines,
            networks = result.networks,
            "Evicted stale cache files"
        );
    }
    result
}

fn days(n: u64) -> Duration {
    Duration::from_secs(n * SECONDS_PER_DAY)
}

fn evict_dir(dir: &Path, max_age: Duration, now: SystemTime) -> usize {
    let entries = match std::fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) => {
            debug!(dir = %dir.display(), error = %e, "Skipping cache directory");
            return 0;
        }
    };

    let mut removed = 0;
    for entry in entries.flatten() {
        let path = entry.path();
        let Ok(metadata) = entry.metadata() else {
            continue;
        };
        if !metadata.is_file() {
            continue;
        }
        let age = metadata
            .modified()
            .ok()
            .and_then(|mtime| now.duration_since(mtime).ok())
            .unwrap_or_default();
        if age <= max_age {
            continue;
        }
        match std::fs::remove_file(&path) {
            Ok(()) => removed += 1,
            Err(e) => warn!(path = %path.display(), error = %e, "Failed to evict cache file"),
        }
    }
    removed
}
