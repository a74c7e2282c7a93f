//! File record reads and blob metadata.

use serde_json::json;
use tracing::{debug, warn};

use super::{FILES_COLLECTION, FolderLookup, StorageService, decode};
use crate::blob::{BlobMetadata, MetadataUpdate};
use crate::document::Document;
use crate::error::{StorageError, StorageResult};
use crate::models::{File, MediaType};

/// Filters for [`StorageService::get_files`].
#[derive(Debug, Clone, Default)]
pub struct GetFilesOptions {
    pub folder: FolderLookup,
    pub media_type: Option<MediaType>,
}

impl GetFilesOptions {
    pub fn in_folder(mut self, folder: FolderLookup) -> Self {
        self.folder = folder;
        self
    }

    pub fn of_type(mut self, media_type: MediaType) -> Self {
        self.media_type = Some(media_type);
        self
    }
}

/// Input to [`StorageService::update_metadata`].
#[derive(Debug, Clone, Default)]
pub struct UpdateMetadataOptions {
    pub file_id: String,
    pub updates: MetadataUpdate,
}

impl StorageService {
    /// A single file record, or `None` if it does not exist.
    pub async fn get_file(&self, file_id: &str) -> StorageResult<Option<File>> {
        if file_id.is_empty() {
            return Err(StorageError::missing("getFile", "at least the file ID"));
        }
        self.load_file(file_id).await
    }

    /// File records, optionally filtered by media type and folder.
    ///
    /// Folder ids are compared exactly, so a numeric id never matches its
    /// string form. A folder name that resolves to nothing yields no files.
    pub async fn get_files(&self, options: &GetFilesOptions) -> StorageResult<Vec<File>> {
        let docs = match options.media_type {
            Some(media_type) => {
                self.documents
                    .query_eq(FILES_COLLECTION, "type", &json!(media_type.as_str()))
                    .await?
            }
            None => self.documents.list(FILES_COLLECTION).await?,
        };

        let folder_id = if options.folder.is_set() {
            match self.resolve_folder_id(&options.folder).await? {
                Some(id) => Some(id),
                None => {
                    debug!(lookup = ?options.folder, "folder filter matched no folder");
                    return Ok(Vec::new());
                }
            }
        } else {
            None
        };

        Ok(docs
            .into_iter()
            .filter_map(decode_file)
            .filter(|file| {
                folder_id
                    .as_ref()
                    .is_none_or(|id| file.folder_id.as_ref() == Some(id))
            })
            .collect())
    }

    /// Blob metadata of a file's original upload.
    pub async fn get_metadata(&self, file_id: &str) -> StorageResult<Option<BlobMetadata>> {
        if file_id.is_empty() {
            return Err(StorageError::missing("getMetadata", "at least the file ID"));
        }
        self.ensure_blob_access("getMetadata")?;

        let Some(file) = self.load_file(file_id).await? else {
            return Ok(None);
        };
        let key = self.blob_key("getMetadata", &file.file, None)?;
        Ok(Some(self.blobs.metadata(&key).await?))
    }

    /// Patch the blob metadata of a file's original upload.
    pub async fn update_metadata(
        &self,
        options: &UpdateMetadataOptions,
    ) -> StorageResult<Option<BlobMetadata>> {
        if options.file_id.is_empty() || options.updates.is_empty() {
            return Err(StorageError::missing(
                "updateMetadata",
                "the \"fileID\" and the \"updates\" object",
            ));
        }
        self.ensure_blob_access("updateMetadata")?;

        let Some(file) = self.load_file(&options.file_id).await? else {
            return Ok(None);
        };
        let key = self.blob_key("updateMetadata", &file.file, None)?;
        let updated = self.blobs.update_metadata(&key, &options.updates).await?;

        debug!(file_id = %options.file_id, key = %key, "file metadata updated");
        Ok(Some(updated))
    }
}

fn decode_file(doc: Document) -> Option<File> {
    match decode::<File>(FILES_COLLECTION, &doc.id, doc.data) {
        Ok(file) => Some(file),
        Err(e) => {
            warn!(error = %e, "skipping malformed file record");
            None
        }
    }
}
