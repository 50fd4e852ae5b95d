use tracing::{debug, info, warn};

use super::archive::{extract_zip, move_file, remove_scratch, sha256_file};
use super::{Provisioner, MAX_FETCH_ATTEMPTS};
use crate::protocol::ServerClient;
use crate::worker::error::ProvisionError;
use crate::workload::BookSpec;

impl<C: ServerClient> Provisioner<'_, C> {
    /// Ensures `Books/<name>` exists with the expected SHA-256.
    ///
    /// A mismatching file is deleted and fetched again; a second mismatch
    /// fails the attempt. Books named `NONE` are skipped.
    pub async fn provision_book(&self, book: &BookSpec) -> Result<(), ProvisionError> {
        if book.name.eq_ignore_ascii_case("none") {
            return Ok(());
        }

        let path = self.dirs.books().join(&book.name);
        let mut attempt = 1;
        loop {
            if !path.is_file() {
                info!(book = %book.name, "Fetching opening book");
                let bytes = self.client.fetch(&book.source, None).await?;
                let scratch = self.dirs.scratch().join(format!("book-{}", book.name));
                let extracted = extract_zip(bytes, scratch.clone()).await;
                let moved = extracted.and_then(|root| move_file(&root, &path).map_err(ProvisionError::from));
                remove_scratch(&scratch);
                moved?;
            }

            let actual = sha256_file(&path).await?;
            if actual.eq_ignore_ascii_case(&book.sha) {
                debug!(book = %book.name, sha = %actual, "Opening book verified");
                return Ok(());
            }

            warn!(book = %book.name, expected = %book.sha, actual = %actual, attempt, "Opening book hash mismatch");
            std::fs::remove_file(&path)?;
            if attempt >= MAX_FETCH_ATTEMPTS {
                return Err(ProvisionError::CorruptedBook {
                    name: book.name.clone(),
                    expected: book.sha.to_uppercase(),
                    actual: actual.to_uppercase(),
                });
            }
            attempt += 1;
        }
    }
}
