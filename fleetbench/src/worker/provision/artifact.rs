//! Pre-built artifact selection for private engines.
//!
//! Artifact names follow `<name>-<os>-<vector>-<bitop>`, for example
//! `torch-linux-avx2-pext`.

use serde::Deserialize;
use tracing::{debug, info};

use super::archive::{extract_zip, move_file, remove_scratch};
use super::Provisioner;
use crate::protocol::ServerClient;
use crate::worker::error::ProvisionError;
use crate::worker::system::{os_name, CpuInfo};
use crate::workload::{EngineSpec, Side};

/// One entry of an artifact listing.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Artifact {
    pub name: String,
    pub id: u64,
}

#[derive(Debug, Deserialize)]
struct ArtifactListing {
    artifacts: Vec<Artifact>,
}

fn has_all(cpu: &CpuInfo, flags: &[&str]) -> bool {
    flags.iter().all(|f| cpu.flags.iter().any(|have| have == f))
}

/// Vector tiers this CPU supports, best first.
fn vector_tiers(cpu: &CpuInfo) -> Vec<&'static str> {
    let ssse3 = has_all(cpu, &["SSSE3"]);
    let sse4 = ssse3 && has_all(cpu, &["SSE41", "SSE42"]);
    let avx = sse4 && has_all(cpu, &["AVX"]);
    let avx2 = avx && has_all(cpu, &["AVX2", "FMA"]);
    let avx512 = avx2 && has_all(cpu, &["AVX512BW", "AVX512DQ", "AVX512F"]);
    let vnni = avx512 && has_all(cpu, &["AVX512VNNI"]);

    [
        (vnni, "vnni"),
        (avx512, "avx512"),
        (avx2, "avx2"),
        (avx, "avx"),
        (sse4, "sse4"),
        (ssse3, "ssse3"),
    ]
    .into_iter()
    .filter(|(supported, _)| *supported)
    .map(|(_, tier)| tier)
    .collect()
}

/// AMD parts before Zen 3 emulate PEXT in microcode. The EPYC 7B12 is
/// treated as fast.
fn has_slow_pext(cpu_name: &str) -> bool {
    let upper = cpu_name.to_uppercase();
    (upper.contains("AMD") || upper.contains("RYZEN")) && !upper.contains("7B12")
}

fn bitop_tiers(cpu: &CpuInfo) -> Vec<&'static str> {
    let pext = has_all(cpu, &["BMI2"]) && !has_slow_pext(&cpu.name);
    let popcnt = has_all(cpu, &["POPCNT"]);
    [(pext, "pext"), (popcnt, "popcnt")]
        .into_iter()
        .filter(|(supported, _)| *supported)
        .map(|(_, tier)| tier)
        .collect()
}

/// Chooses the artifact matching `os` with the best vector tier present
/// in both the CPU and the listing, then the best bit-manipulation tier.
pub fn select_best_artifact<'a>(names: &[&'a str], os: &str, cpu: &CpuInfo) -> Option<&'a str> {
    let os = os.to_lowercase();
    let mut options: Vec<(&'a str, Vec<&'a str>)> = names
        .iter()
        .map(|name| (*name, name.split('-').collect::<Vec<_>>()))
        .filter(|(_, parts)| parts.len() >= 4 && parts[1] == os)
        .collect();

    for (position, tiers) in [(2, vector_tiers(cpu)), (3, bitop_tiers(cpu))] {
        if let Some(best) = tiers
            .into_iter()
            .find(|tier| options.iter().any(|(_, parts)| parts[position] == *tier))
        {
            options.retain(|(_, parts)| parts[position] == best);
        }
    }

    options.first().map(|(name, _)| *name)
}

/// Download URL of an artifact listed at `source`.
pub fn artifact_download_url(source: &str, id: u64) -> String {
    let base = source.split("/runs/").next().unwrap_or(source).trim_end_matches('/');
    format!("{}/artifacts/{}/zip", base, id)
}

impl<C: ServerClient> Provisioner<'_, C> {
    /// Fetches the best artifact of a private engine into `Engines/`.
    ///
    /// Returns the path of the binary.
    pub(super) async fn fetch_artifact(
        &self,
        side: Side,
        engine: &EngineSpec,
        binary_name: &str,
    ) -> Result<std::path::PathBuf, ProvisionError> {
        let credentials = self.dirs.credentials_file(&engine.engine);
        let token = std::fs::read_to_string(&credentials)
            .ok()
            .and_then(|content| content.lines().next().map(|l| l.trim().to_string()))
            .filter(|t| !t.is_empty())
            .ok_or_else(|| ProvisionError::MissingCredentials(credentials.display().to_string()))?;

        let listing_bytes = self.client.fetch(&engine.source, Some(&token)).await?;
        let listing: ArtifactListing = serde_json::from_slice(&listing_bytes)
            .map_err(|e| ProvisionError::Archive(format!("invalid artifact listing: {}", e)))?;

        let names: Vec<&str> = listing.artifacts.iter().map(|a| a.name.as_str()).collect();
        let chosen = select_best_artifact(&names, os_name(), self.cpu)
            .and_then(|best| listing.artifacts.iter().find(|a| a.name == best))
            .ok_or_else(|| ProvisionError::MissingArtifact {
                side,
                engine: engine.engine.clone(),
                available: names.iter().map(|n| n.to_string()).collect(),
            })?;

        info!(side = %side, artifact = %chosen.name, "Downloading artifact");
        let bytes = self
            .client
            .fetch(&artifact_download_url(&engine.source, chosen.id), Some(&token))
            .await?;

        let scratch = self.dirs.scratch().join(binary_name);
        let target = self.dirs.engines().join(binary_name);
        let result = match extract_zip(bytes, scratch.clone()).await {
            Ok(binary) if binary.is_file() => move_file(&binary, &target).map_err(ProvisionError::from),
            Ok(_) => Err(ProvisionError::Archive(format!("artifact {} holds no single binary", chosen.name))),
            Err(e) => Err(e),
        };
        remove_scratch(&scratch);
        result?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(&target, std::fs::Permissions::from_mode(0o755))?;
        }

        debug!(binary = %target.display(), "Artifact installed");
        Ok(target)
    }
}
