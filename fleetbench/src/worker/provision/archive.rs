//! Hashing and zip extraction helpers.

use std::fs::File;
use std::io::{BufReader, Cursor, Read};
use std::path::{Path, PathBuf};

use sha2::{Digest, Sha256};

use crate::worker::error::ProvisionError;

/// Lowercase hex SHA-256 of `data`.
pub fn sha256_hex(data: &[u8]) -> String {
    format!("{:x}", Sha256::digest(data))
}

/// Lowercase hex SHA-256 of a file, hashed on the blocking pool.
pub async fn sha256_file(path: &Path) -> Result<String, ProvisionError> {
    let path = path.to_path_buf();
    tokio::task::spawn_blocking(move || hash_file_blocking(&path))
        .await
        .map_err(|e| ProvisionError::Io(std::io::Error::other(e)))?
}

fn hash_file_blocking(path: &Path) -> Result<String, ProvisionError> {
    let mut reader = BufReader::new(File::open(path)?);
    let mut hasher = Sha256::new();
    let mut buffer = [0u8; 8192];

    loop {
        let bytes_read = reader.read(&mut buffer)?;
        if bytes_read == 0 {
            break;
        }
        hasher.update(&buffer[..bytes_read]);
    }

    Ok(format!("{:x}", hasher.finalize()))
}

/// Extracts a zip archive into `dest`, replacing whatever was there.
///
/// Returns the archive's single top-level entry when there is exactly
/// one, otherwise `dest` itself.
pub async fn extract_zip(bytes: Vec<u8>, dest: PathBuf) -> Result<PathBuf, ProvisionError> {
    tokio::task::spawn_blocking(move || extract_zip_blocking(&bytes, &dest))
        .await
        .map_err(|e| ProvisionError::Io(std::io::Error::other(e)))?
}

fn extract_zip_blocking(bytes: &[u8], dest: &Path) -> Result<PathBuf, ProvisionError> {
    if dest.exists() {
        std::fs::remove_dir_all(dest)?;
    }
    std::fs::create_dir_all(dest)?;

    let mut archive = zip::ZipArchive::new(Cursor::new(bytes))?;
    archive.extract(dest)?;

    let entries: Vec<PathBuf> = std::fs::read_dir(dest)?
        .filter_map(|e| e.ok())
        .map(|e| e.path())
        .collect();
    match entries.as_slice() {
        [single] => Ok(single.clone()),
        [] => Err(ProvisionError::Archive("archive is empty".to_string())),
        _ => Ok(dest.to_path_buf()),
    }
}

/// Moves `from` to `to`, replacing an existing file.
pub fn move_file(from: &Path, to: &Path) -> std::io::Result<()> {
    if let Some(parent) = to.parent() {
        std::fs::create_dir_all(parent)?;
    }
    if to.exists() {
        std::fs::remove_file(to)?;
    }
    std::fs::rename(from, to)
}

/// Removes a scratch directory, ignoring a missing one.
pub fn remove_scratch(dir: &Path) {
    if let Err(e) = std::fs::remove_dir_all(dir) {
        if e.kind() != std::io::ErrorKind::NotFound {
            tracing::warn!(dir = %dir.display(), error = %e, "Failed to remove scratch directory");
        }
    }
}
