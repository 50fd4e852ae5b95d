//! Obtaining everything a workload needs before games can start.
//!
//! Books and networks are content-addressed and verified on every use.
//! Engine binaries are cached under their [`EngineSpec::binary_name`]:
//! public engines are built from source, private ones are fetched as
//! pre-built artifacts chosen for this machine's CPU.
//!
//! [`EngineSpec::binary_name`]: crate::workload::EngineSpec::binary_name

mod archive;
mod artifact;
mod book;
mod engine;
mod network;

pub use archive::{sha256_file, sha256_hex};
pub use artifact::{artifact_download_url, select_best_artifact, Artifact};

use crate::protocol::ServerClient;
use crate::worker::settings::WorkDirs;
use crate::worker::system::CpuInfo;

/// Cached files are fetched again once after a hash mismatch.
const MAX_FETCH_ATTEMPTS: u32 = 2;

/// Provisions books, networks and engines into the work directories.
pub struct Provisioner<'a, C> {
    client: &'a C,
    dirs: &'a WorkDirs,
    cpu: &'a CpuInfo,
}

impl<'a, C: ServerClient> Provisioner<'a, C> {
    pub fn new(client: &'a C, dirs: &'a WorkDirs, cpu: &'a CpuInfo) -> Self {
        Self { client, dirs, cpu }
    }
}
