use std::path::{Path, PathBuf};

use tokio::process::Command;
use tracing::{debug, info, warn};

use super::archive::{extract_zip, move_file, remove_scratch};
use super::Provisioner;
use crate::protocol::ServerClient;
use crate::worker::error::ProvisionError;
use crate::workload::{EngineSpec, Side};

/// `name`, or `name.exe` when only that exists.
pub(crate) fn existing_binary(dir: &Path, name: &str) -> Option<PathBuf> {
    let plain = dir.join(name);
    if plain.is_file() {
        return Some(plain);
    }
    let exe = dir.join(format!("{}.exe", name));
    exe.is_file().then_some(exe)
}

/// Arguments of the source build: `make -j EXE=<name> [EVALFILE=<net>]`.
pub fn make_args(binary_name: &str, network: Option<&Path>) -> Vec<String> {
    let mut args = vec!["-j".to_string(), format!("EXE={}", binary_name)];
    if let Some(network) = network {
        args.push(format!("EVALFILE={}", network.display().to_string().replace('\\', "/")));
    }
    args
}

impl<C: ServerClient> Provisioner<'_, C> {
    /// Ensures the engine binary exists in `Engines/` and returns its file
    /// name there.
    ///
    /// `network` is embedded into source builds; private engines load it at
    /// runtime instead.
    pub async fn provision_engine(
        &self,
        side: Side,
        engine: &EngineSpec,
        network: Option<&Path>,
    ) -> Result<String, ProvisionError> {
        let name = engine.binary_name();
        if let Some(existing) = existing_binary(&self.dirs.engines(), &name) {
            debug!(side = %side, binary = %existing.display(), "Engine binary cached");
            return Ok(file_name(&existing, &name));
        }

        let binary = if engine.private {
            self.fetch_artifact(side, engine, &name).await?
        } else {
            self.build_from_source(side, engine, &name, network).await?
        };
        Ok(file_name(&binary, &name))
    }

    async fn build_from_source(
        &self,
        side: Side,
        engine: &EngineSpec,
        name: &str,
        network: Option<&Path>,
    ) -> Result<PathBuf, ProvisionError> {
        info!(side = %side, engine = %engine.engine, branch = %engine.name, "Building engine");

        let bytes = self.client.fetch(&engine.source, None).await?;
        let scratch = self.dirs.scratch().join(name);
        let result = self.run_make(side, engine, name, network, bytes, &scratch).await;
        remove_scratch(&scratch);
        result
    }

    async fn run_make(
        &self,
        side: Side,
        engine: &EngineSpec,
        name: &str,
        network: Option<&Path>,
        archive: Vec<u8>,
        scratch: &Path,
    ) -> Result<PathBuf, ProvisionError> {
        let root = extract_zip(archive, scratch.to_path_buf()).await?;
        let make_dir = root.join(&engine.build_path);

        let network = match network {
            Some(path) => Some(std::fs::canonicalize(path)?),
            None => None,
        };
        let output = Command::new("make")
            .args(make_args(name, network.as_deref()))
            .current_dir(&make_dir)
            .kill_on_drop(true)
            .output()
            .await?;

        let log = format!(
            "{}{}",
            String::from_utf8_lossy(&output.stdout),
            String::from_utf8_lossy(&output.stderr)
        );
        debug!(side = %side, status = %output.status, "Build finished");

        match existing_binary(&make_dir, name) {
            Some(built) if output.status.success() => {
                let target = self.dirs.engines().join(file_name(&built, name));
                move_file(&built, &target)?;
                Ok(target)
            }
            _ => {
                warn!(side = %side, engine = %engine.engine, status = %output.status, "Build failed");
                Err(ProvisionError::BuildFailed {
                    side,
                    engine: engine.engine.clone(),
                    output: log,
                })
            }
        }
    }
}

fn file_name(path: &Path, fallback: &str) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| fallback.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{sample_engine, Call, FakeServer};
    use crate::worker::settings::WorkDirs;
    use crate::worker::system::CpuInfo;

    #[test]
    fn test_make_args() {
        assert_eq!(make_args("Ethereal-ABC", None), vec!["-j", "EXE=Ethereal-ABC"]);
        assert_eq!(
            make_args("Ethereal-ABC", Some(Path::new("/work/Networks/ABCD1234"))),
            vec!["-j", "EXE=Ethereal-ABC", "EVALFILE=/work/Networks/ABCD1234"]
        );
    }

    #[tokio::test]
    async fn test_cached_binary_is_reused() {
        let temp_dir = tempfile::TempDir::new().unwrap();
        let dirs = WorkDirs::new(temp_dir.path());
        dirs.create_all().unwrap();
        let engine = sample_engine("dev");
        std::fs::write(dirs.engines().join(engine.binary_name()), b"binary").unwrap();
        let server = FakeServer::default();
        let cpu = CpuInfo::default();

        let name = Provisioner::new(&server, &dirs, &cpu)
            .provision_engine(Side::Dev, &engine, None)
            .await
            .unwrap();
        assert_eq!(name, engine.binary_name());
        assert!(server.calls().is_empty());
    }

    #[tokio::test]
    async fn test_private_engine_requires_credentials() {
        let temp_dir = tempfile::TempDir::new().unwrap();
        let dirs = WorkDirs::new(temp_dir.path());
        dirs.create_all().unwrap();
        let mut engine = sample_engine("dev");
        engine.private = true;
        let server = FakeServer::default();
        let cpu = CpuInfo::default();

        let result = Provisioner::new(&server, &dirs, &cpu)
            .provision_engine(Side::Base, &engine, None)
            .await;
        assert!(matches!(result, Err(ProvisionError::MissingCredentials(_))));
    }

    #[tokio::test]
    async fn test_private_engine_without_matching_artifact() {
        let temp_dir = tempfile::TempDir::new().unwrap();
        let dirs = WorkDirs::new(temp_dir.path());
        dirs.create_all().unwrap();
        let mut engine = sample_engine("dev");
        engine.private = true;
        engine.source = "https://api.example.com/runs/1/artifacts".to_string();
        std::fs::write(dirs.credentials_file(&engine.engine), "token-123\n").unwrap();

        let server = FakeServer::default();
        server.serve(
            &engine.source,
            br#"{"artifacts": [{"name": "ethereal-plan9-avx2-pext", "id": 3}]}"#.to_vec(),
        );
        let cpu = CpuInfo::default();

        let result = Provisioner::new(&server, &dirs, &cpu)
            .provision_engine(Side::Dev, &engine, None)
            .await;
        match result {
            Err(ProvisionError::MissingArtifact { side, available, .. }) => {
                assert_eq!(side, Side::Dev);
                assert_eq!(available, vec!["ethereal-plan9-avx2-pext"]);
            }
            other => panic!("expected missing artifact, got {:?}", other),
        }
        assert!(server.calls().contains(&Call::Fetch {
            url: engine.source.clone(),
            token: Some("token-123".to_string()),
        }));
    }

    #[tokio::test]
    async fn test_failed_source_download() {
        let temp_dir = tempfile::TempDir::new().unwrap();
        let dirs = WorkDirs::new(temp_dir.path());
        dirs.create_all().unwrap();
        let engine = sample_engine("dev");
        let server = FakeServer::default();
        let cpu = CpuInfo::default();

        let result = Provisioner::new(&server, &dirs, &cpu)
            .provision_engine(Side::Dev, &engine, None)
            .await;
        assert!(matches!(result, Err(ProvisionError::Http(_))));
    }
}
