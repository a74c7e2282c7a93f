//! Deleting a file, its variants and its record.

use futures::future::join_all;
use tracing::{debug, info, warn};

use super::{FILES_COLLECTION, StorageService};
use crate::error::{PartialOperation, StorageError, StorageResult};
use crate::models::File;
use crate::paths::is_url;

/// Outcome of a completed deletion.
#[derive(Debug, Clone)]
pub struct DeletedFile {
    /// The record as it was before deletion.
    pub file: File,
    /// Keys of every blob removed, original first.
    pub deleted_blobs: Vec<String>,
}

impl StorageService {
    /// Delete a file's original blob, then its variants concurrently, then
    /// its record. `None` when the record does not exist.
    ///
    /// A failure after the original is gone is reported as
    /// [`StorageError::Partial`] listing the blobs already removed; the record
    /// is kept so the deletion can be retried.
    pub async fn delete_file(&self, file_id: &str) -> StorageResult<Option<DeletedFile>> {
        if self.context.is_server_privileged() {
            return Err(StorageError::unsupported(
                "\"storage.deleteFile()\" is not currently supported for server-side use.",
            ));
        }
        if file_id.is_empty() {
            return Err(StorageError::missing("deleteFile", "at least the file ID"));
        }
        self.ensure_blob_access("deleteFile")?;

        let Some(file) = self.load_file(file_id).await? else {
            debug!(file_id = %file_id, "nothing to delete");
            return Ok(None);
        };

        let original = self.blob_key("deleteFile", &file.file, None)?;
        self.blobs.delete(&original).await?;
        let mut deleted = vec![original];

        // A URL reference has no variants of its own.
        let mut variant_keys: Vec<String> = Vec::new();
        if !is_url(&file.file) {
            for size in file.variants().iter().filter(|s| s.is_addressable()) {
                let key = self.blob_key("deleteFile", &file.file, Some(size))?;
                if !variant_keys.contains(&key) && !deleted.contains(&key) {
                    variant_keys.push(key);
                }
            }
        }

        let results = join_all(variant_keys.iter().map(|key| self.blobs.delete(key))).await;
        let mut failure = None;
        for (key, result) in variant_keys.into_iter().zip(results) {
            match result {
                Ok(()) => deleted.push(key),
                Err(e) => {
                    warn!(file_id = %file_id, key = %key, error = %e, "variant deletion failed");
                    if failure.is_none() {
                        failure = Some(StorageError::Backend(e));
                    }
                }
            }
        }
        if let Some(cause) = failure {
            return Err(self.partial_deletion(file_id, deleted, cause));
        }

        if let Err(e) = self.documents.delete(FILES_COLLECTION, file_id).await {
            return Err(self.partial_deletion(file_id, deleted, e.into()));
        }

        info!(file_id = %file_id, blobs = deleted.len(), "file deleted");
        Ok(Some(DeletedFile {
            file,
            deleted_blobs: deleted,
        }))
    }

    fn partial_deletion(
        &self,
        file_id: &str,
        deleted: Vec<String>,
        cause: StorageError,
    ) -> StorageError {
        warn!(
            file_id = %file_id,
            deleted = ?deleted,
            error = %cause,
            "deletion stopped after removing blobs"
        );
        StorageError::partial(PartialOperation::Deletion, file_id, deleted, cause)
    }
}
