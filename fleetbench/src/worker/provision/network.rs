use std::path::PathBuf;

use tracing::{debug, info, warn};

use super::archive::sha256_file;
use super::{Provisioner, MAX_FETCH_ATTEMPTS};
use crate::protocol::ServerClient;
use crate::worker::error::ProvisionError;
use crate::workload::EngineSpec;

impl<C: ServerClient> Provisioner<'_, C> {
    /// Ensures the engine's network weights are present as
    /// `Networks/<id>`, where `id` is a prefix of their SHA-256.
    ///
    /// Returns `None` for engines without a network.
    pub async fn provision_network(&self, engine: &EngineSpec) -> Result<Option<PathBuf>, ProvisionError> {
        let Some(network) = engine
            .network
            .as_deref()
            .filter(|n| !n.is_empty() && !n.eq_ignore_ascii_case("none"))
        else {
            return Ok(None);
        };

        let path = self.dirs.networks().join(network);
        let mut attempt = 1;
        loop {
            if !path.is_file() {
                info!(engine = %engine.engine, network, "Fetching network weights");
                let bytes = self.client.fetch_network(&engine.engine, network).await?;
                tokio::fs::write(&path, bytes).await?;
            }

            let actual = sha256_file(&path).await?.to_uppercase();
            if actual.starts_with(&network.to_uppercase()) {
                debug!(network, "Network weights verified");
                return Ok(Some(path));
            }

            warn!(network, actual = %actual, attempt, "Network hash mismatch");
            std::fs::remove_file(&path)?;
            if attempt >= MAX_FETCH_ATTEMPTS {
                return Err(ProvisionError::CorruptedNetwork {
                    network: network.to_string(),
                    actual: actual.chars().take(network.len()).collect(),
                });
            }
            attempt += 1;
        }
    }
}
