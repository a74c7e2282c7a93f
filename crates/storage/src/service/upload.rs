//! Uploading files and their image size variants.

use chrono::{SecondsFormat, Utc};
use futures::future::join_all;
use tracing::{debug, info, warn};

use super::{FILES_COLLECTION, FolderLookup, StorageService};
use crate::blob::{BlobMetadata, StringEncoding, UploadMetadata};
use crate::error::{PartialOperation, StorageError, StorageResult};
use crate::models::{
    FILE_ID_METADATA_KEY, FOLDER_ID_METADATA_KEY, File, FileMeta, FolderKey, MediaType,
    SizeSpec, UNKNOWN_USER,
};
use crate::paths::{original_key, variant_key};
use crate::planner::plan_sizes;

/// The content being uploaded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileData {
    /// Raw bytes, optionally carrying the client-side file name.
    Bytes { data: Vec<u8>, name: Option<String> },
    /// A string decoded according to [`UploadOptions::string_encoding`].
    Text(String),
}

impl FileData {
    pub fn bytes(data: impl Into<Vec<u8>>) -> Self {
        Self::Bytes {
            data: data.into(),
            name: None,
        }
    }

    pub fn named(name: impl Into<String>, data: impl Into<Vec<u8>>) -> Self {
        Self::Bytes {
            data: data.into(),
            name: Some(name.into()),
        }
    }

    pub fn text(text: impl Into<String>) -> Self {
        Self::Text(text.into())
    }

    /// The file name carried by the data itself.
    pub fn name(&self) -> Option<&str> {
        match self {
            Self::Bytes { name, .. } => name.as_deref().filter(|n| !n.is_empty()),
            Self::Text(_) => None,
        }
    }
}

/// Options for [`StorageService::upload`].
#[derive(Debug, Clone, Default)]
pub struct UploadOptions {
    /// Target folder, by id or name.
    pub folder: FolderLookup,
    /// Extra image variants; merged with the configured defaults.
    pub sizes: Option<Vec<SizeSpec>>,
    /// Use `sizes` instead of the defaults rather than in addition to them.
    pub overwrite_sizes: bool,
    /// Blob metadata. `name` overrides the name carried by the data.
    pub metadata: UploadMetadata,
    /// How [`FileData::Text`] is decoded. Defaults to raw UTF-8.
    pub string_encoding: Option<StringEncoding>,
}

impl UploadOptions {
    pub fn in_folder(mut self, folder: FolderLookup) -> Self {
        self.folder = folder;
        self
    }

    pub fn with_sizes(mut self, sizes: Vec<SizeSpec>) -> Self {
        self.sizes = Some(sizes);
        self
    }

    pub fn overwrite_sizes(mut self) -> Self {
        self.overwrite_sizes = true;
        self
    }

    pub fn with_metadata(mut self, metadata: UploadMetadata) -> Self {
        self.metadata = metadata;
        self
    }

    pub fn with_string_encoding(mut self, encoding: StringEncoding) -> Self {
        self.string_encoding = Some(encoding);
        self
    }
}

/// Outcome of a completed upload.
#[derive(Debug, Clone)]
pub struct UploadResult {
    /// The persisted file record.
    pub file: File,
    /// Blob metadata of the original upload.
    pub blob: BlobMetadata,
}

impl StorageService {
    /// Upload a file, its image variants and its metadata record.
    ///
    /// The original is written first, then every variant concurrently, then
    /// the record. A failure once the original is stored is reported as
    /// [`StorageError::Partial`] listing the blobs that were written; none
    /// of them are removed.
    pub async fn upload(
        &self,
        data: FileData,
        options: UploadOptions,
    ) -> StorageResult<UploadResult> {
        if self.context.is_server_privileged() {
            return Err(StorageError::unsupported(
                "\"storage.upload()\" is not currently supported for server-side use.",
            ));
        }
        self.ensure_blob_access("upload")?;

        let UploadOptions {
            folder,
            sizes,
            overwrite_sizes,
            mut metadata,
            string_encoding,
        } = options;

        let defaults = self.settings.image_sizes().await?;
        let sizes = plan_sizes(defaults, sizes, overwrite_sizes);

        let id = self.ids.next();
        let filename = upload_filename(&id, metadata.name.as_deref(), data.name());
        let folder_id = self
            .resolve_folder_id(&folder)
            .await?
            .map(FolderKey::into_text);

        metadata
            .custom_metadata
            .insert(FILE_ID_METADATA_KEY.to_string(), id.clone());
        if let Some(folder_id) = &folder_id {
            metadata
                .custom_metadata
                .insert(FOLDER_ID_METADATA_KEY.to_string(), folder_id.to_string());
        }

        let key = original_key(&filename);
        let blob = match &data {
            FileData::Bytes { data, .. } => self.blobs.put(&key, data, &metadata).await?,
            FileData::Text(text) => {
                self.blobs
                    .put_string(&key, text, string_encoding, &metadata)
                    .await?
            }
        };
        debug!(file_id = %id, key = %key, size = blob.size, "original uploaded");

        let content_type = blob.content_type.clone().unwrap_or_default();
        let media_type = MediaType::from_content_type(&content_type);
        let mut touched = vec![key];

        let mut file = File {
            id: id.clone(),
            file: filename,
            folder_id,
            media_type,
            content_type,
            sizes: None,
            meta: FileMeta::default(),
        };

        if let (MediaType::Images, FileData::Bytes { data: original, .. }) = (media_type, &data) {
            let results = join_all(
                sizes
                    .iter()
                    .map(|size| self.create_sized_image(original, &file.file, size)),
            )
            .await;

            let mut failure = None;
            for result in results {
                match result {
                    Ok(variant) => touched.push(variant),
                    Err(e) => {
                        warn!(file_id = %id, error = %e, "image variant failed");
                        if failure.is_none() {
                            failure = Some(e);
                        }
                    }
                }
            }
            if let Some(e) = failure {
                return Err(self.partial_upload(&id, touched, e));
            }
            file.sizes = Some(sizes);
        }

        file.meta = FileMeta {
            created_by: self
                .auth
                .current_user_id()
                .unwrap_or_else(|| UNKNOWN_USER.to_string()),
            created_date: Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
        };

        if let Err(e) = self.write_file_record(&file).await {
            return Err(self.partial_upload(&id, touched, e));
        }

        info!(
            file_id = %id,
            filename = %file.file,
            media_type = file.media_type.as_str(),
            variants = file.variants().len(),
            "file uploaded"
        );
        Ok(UploadResult { file, blob })
    }

    /// Resize the original to `size` and store it at the variant's key.
    async fn create_sized_image(
        &self,
        original: &[u8],
        filename: &str,
        size: &SizeSpec,
    ) -> StorageResult<String> {
        let Some(key) = variant_key(filename, size) else {
            return Err(StorageError::InvalidSizeSpec {
                filename: filename.to_string(),
            });
        };

        let resized = self.resizer.resize(original, size).await?;
        self.blobs
            .put(&key, &resized, &UploadMetadata::default())
            .await?;

        debug!(key = %key, size = resized.len(), "image variant uploaded");
        Ok(key)
    }

    async fn write_file_record(&self, file: &File) -> StorageResult<()> {
        let record = serde_json::to_value(file)?;
        self.documents
            .set(FILES_COLLECTION, &file.id, record)
            .await?;
        Ok(())
    }

    fn partial_upload(
        &self,
        file_id: &str,
        touched: Vec<String>,
        cause: StorageError,
    ) -> StorageError {
        warn!(
            file_id = %file_id,
            orphaned = ?touched,
            error = %cause,
            "upload stopped after writing blobs"
        );
        StorageError::partial(PartialOperation::Upload, file_id, touched, cause)
    }
}

/// `{id}_{name}`, or just `{id}` without a name. An explicit metadata name
/// wins over the data's own name.
fn upload_filename(id: &str, metadata_name: Option<&str>, data_name: Option<&str>) -> String {
    match metadata_name.filter(|n| !n.is_empty()).or(data_name) {
        Some(name) => format!("{id}_{name}"),
        None => id.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn filename_prefers_metadata_name() {
        assert_eq!(
            upload_filename("1", Some("meta.png"), Some("data.png")),
            "1_meta.png"
        );
        assert_eq!(upload_filename("1", Some(""), Some("data.png")), "1_data.png");
        assert_eq!(upload_filename("1", None, Some("data.png")), "1_data.png");
        assert_eq!(upload_filename("1", None, None), "1");
    }

    #[test]
    fn file_data_names() {
        assert_eq!(FileData::named("a.png", vec![1]).name(), Some("a.png"));
        assert_eq!(FileData::named("", vec![1]).name(), None);
        assert_eq!(FileData::bytes(vec![1]).name(), None);
        assert_eq!(FileData::text("hi").name(), None);
    }
}
