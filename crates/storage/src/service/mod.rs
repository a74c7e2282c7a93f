//! Storage service: the file lifecycle over injected backends.
//!
//! Collaborators are handed in at construction; nothing is looked up from
//! global state. Each operation consults the [`ExecutionContext`] before
//! doing any I/O.

mod delete;
mod files;
mod folders;
mod upload;
mod url;

use std::sync::Arc;
use std::sync::atomic::{AtomicI64, Ordering};

use chrono::Utc;
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::blob::BlobStore;
use crate::context::{Anonymous, AuthContext, ExecutionContext};
use crate::document::DocumentStore;
use crate::error::{StorageError, StorageResult};
use crate::models::{File, SizeSpec};
use crate::paths::{is_url, storage_key};
use crate::resize::ImageResizer;
use crate::settings::SettingsProvider;

pub use delete::DeletedFile;
pub use files::{GetFilesOptions, UpdateMetadataOptions};
pub use folders::FolderLookup;
pub use upload::{FileData, UploadOptions, UploadResult};
pub use url::{UrlOptions, VariantChoice, choose_variant};

/// Collection of file metadata records.
pub const FILES_COLLECTION: &str = "fl_files";

/// Collection of folder records.
pub const FOLDERS_COLLECTION: &str = "fl_folders";

/// Media storage over a document store and a blob store.
pub struct StorageService {
    documents: Arc<dyn DocumentStore>,
    blobs: Arc<dyn BlobStore>,
    resizer: Arc<dyn ImageResizer>,
    settings: Arc<dyn SettingsProvider>,
    auth: Arc<dyn AuthContext>,
    context: ExecutionContext,
    ids: IdGenerator,
}

impl StorageService {
    /// Create a client-mode service with no signed-in user.
    pub fn new(
        documents: Arc<dyn DocumentStore>,
        blobs: Arc<dyn BlobStore>,
        resizer: Arc<dyn ImageResizer>,
        settings: Arc<dyn SettingsProvider>,
    ) -> Self {
        Self {
            documents,
            blobs,
            resizer,
            settings,
            auth: Arc::new(Anonymous),
            context: ExecutionContext::default(),
            ids: IdGenerator::default(),
        }
    }

    pub fn with_auth(mut self, auth: Arc<dyn AuthContext>) -> Self {
        self.auth = auth;
        self
    }

    pub fn with_context(mut self, context: ExecutionContext) -> Self {
        self.context = context;
        self
    }

    pub fn context(&self) -> &ExecutionContext {
        &self.context
    }

    pub fn blobs(&self) -> &Arc<dyn BlobStore> {
        &self.blobs
    }

    pub fn documents(&self) -> &Arc<dyn DocumentStore> {
        &self.documents
    }

    /// Fail unless the caller is allowed to touch blobs at all.
    ///
    /// A server process without admin credentials cannot reach the bucket.
    fn ensure_blob_access(&self, operation: &str) -> StorageResult<()> {
        if self.context.is_server() && !self.context.is_server_privileged() {
            return Err(StorageError::unsupported(format!(
                "\"storage.{operation}()\" requires admin credentials when running on a server"
            )));
        }
        Ok(())
    }

    /// Blob key of a stored file, optionally at one of its variants.
    ///
    /// Full-URL references are resolved through the blob store and ignore
    /// `size`.
    fn blob_key(
        &self,
        operation: &str,
        filename: &str,
        size: Option<&SizeSpec>,
    ) -> StorageResult<String> {
        self.ensure_blob_access(operation)?;

        if !is_url(filename) {
            return Ok(storage_key(filename, size));
        }
        if self.context.is_server_privileged() {
            return Err(StorageError::unsupported(format!(
                "\"storage.{operation}()\" cannot resolve URL file references with admin credentials"
            )));
        }
        self.blobs.key_from_url(filename).ok_or_else(|| {
            StorageError::unsupported(format!(
                "file reference is not a URL of the {} blob store: {filename}",
                self.blobs.scheme()
            ))
        })
    }

    /// Load one file record.
    async fn load_file(&self, file_id: &str) -> StorageResult<Option<File>> {
        self.documents
            .get(FILES_COLLECTION, file_id)
            .await?
            .map(|doc| decode(FILES_COLLECTION, file_id, doc))
            .transpose()
    }
}

impl std::fmt::Debug for StorageService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StorageService")
            .field("blobs", &self.blobs.scheme())
            .field("context", &self.context)
            .finish_non_exhaustive()
    }
}

/// Deserialize a stored document.
fn decode<T: DeserializeOwned>(
    collection: &'static str,
    id: &str,
    doc: Value,
) -> StorageResult<T> {
    serde_json::from_value(doc).map_err(|source| StorageError::Malformed {
        collection,
        id: id.to_string(),
        source,
    })
}

/// Millisecond-timestamp ids, strictly increasing within the process.
#[derive(Debug, Default)]
struct IdGenerator {
    last: AtomicI64,
}

impl IdGenerator {
    fn next(&self) -> String {
        let now = Utc::now().timestamp_millis();
        let previous = self
            .last
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |last| {
                Some(now.max(last + 1))
            })
            .unwrap_or(now);
        now.max(previous + 1).to_string()
    }
}
