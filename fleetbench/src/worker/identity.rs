//! Persisted machine id.

use std::io;
use std::path::Path;

use tracing::{debug, warn};

/// Reads the id saved by a previous session.
///
/// A missing or unreadable file yields `None`; the server then assigns a new id.
pub fn load_machine_id(path: &Path) -> Option<u64> {
    let content = std::fs::read_to_string(path).ok()?;
    match content.trim().parse() {
        Ok(id) => Some(id),
        Err(_) => {
            warn!(path = %path.display(), "Ignoring malformed machine id file");
            None
        }
    }
}

pub fn save_machine_id(path: &Path, id: u64) -> io::Result<()> {
    std::fs::write(path, id.to_string())
}

/// Forgets the saved id after the server rejected it.
pub fn clear_machine_id(path: &Path) -> io::Result<()> {
    match std::fs::remove_file(path) {
        Ok(()) => {
            debug!(path = %path.display(), "Removed machine id file");
            Ok(())
        }
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round_trip_and_clear() {
        let temp_dir = tempfile::TempDir::new().unwrap();
        let path = temp_dir.path().join("machine.txt");

        assert_eq!(load_machine_id(&path), None);
        save_machine_id(&path, 1234).unwrap();
        assert_eq!(load_machine_id(&path), Some(1234));

        clear_machine_id(&path).unwrap();
        assert_eq!(load_machine_id(&path), None);
        // Clearing twice is fine
        clear_machine_id(&path).unwrap();
    }

    #[test]
    fn test_malformed_file() {
        let temp_dir = tempfile::TempDir::new().unwrap();
        let path = temp_dir.path().join("machine.txt");
        std::fs::write(&path, "None\n").unwrap();
        assert_eq!(load_machine_id(&path), None);
    }
}
