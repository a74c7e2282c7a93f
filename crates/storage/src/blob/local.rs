//! Local filesystem blob store.
//!
//! Object bytes live at `{base_path}/{key}`; metadata is kept as JSON in a
//! sidecar tree under `{base_path}/.flamelink-meta/`.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::{debug, warn};

use super::{
    BlobMetadata, BlobStore, MetadataUpdate, UploadMetadata, UrlSigner, decode_key,
    detect_content_type, encode_key, validate_key,
};

/// Directory under the base path holding metadata sidecars.
const METADATA_DIR: &str = ".flamelink-meta";

/// Local filesystem storage.
pub struct LocalBlobStore {
    /// Base path for object storage.
    base_path: PathBuf,
    /// Base URL for public object access.
    base_url: String,
    /// Signs read URLs when configured.
    signer: Option<UrlSigner>,
}

impl LocalBlobStore {
    /// Create a new local blob store.
    pub fn new(base_path: impl Into<PathBuf>, base_url: impl Into<String>) -> Self {
        Self {
            base_path: base_path.into(),
            base_url: base_url.into(),
            signer: None,
        }
    }

    /// Sign URLs with the given signer.
    pub fn with_signer(mut self, signer: UrlSigner) -> Self {
        self.signer = Some(signer);
        self
    }

    /// Resolve a key to its object path.
    ///
    /// Rejects traversal and keys that would land in the metadata tree.
    fn object_path(&self, key: &str) -> Result<PathBuf> {
        validate_key(key)?;
        if key == METADATA_DIR || key.starts_with(&format!("{METADATA_DIR}/")) {
            bail!("blob key collides with metadata directory: {key}");
        }
        Ok(self.base_path.join(key))
    }

    fn metadata_path(&self, key: &str) -> PathBuf {
        self.base_path
            .join(METADATA_DIR)
            .join(format!("{key}.json"))
    }

    async fn write_file(path: &Path, data: &[u8]) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .await
                .context("failed to create directories")?;
        }

        let mut file = fs::File::create(path)
            .await
            .context("failed to create file")?;
        file.write_all(data).await.context("failed to write file")?;
        file.flush().await.context("failed to flush file")?;
        Ok(())
    }

    async fn write_metadata(&self, key: &str, metadata: &BlobMetadata) -> Result<()> {
        let json = serde_json::to_vec_pretty(metadata).context("failed to encode metadata")?;
        Self::write_file(&self.metadata_path(key), &json).await
    }

    /// Metadata for an object written without a sidecar (e.g. copied in by hand).
    async fn synthesize_metadata(&self, key: &str, path: &Path) -> Result<BlobMetadata> {
        let data = fs::read(path)
            .await
            .with_context(|| format!("object not found: {key}"))?;
        let modified: DateTime<Utc> = fs::metadata(path)
            .await
            .and_then(|m| m.modified())
            .map(DateTime::<Utc>::from)
            .unwrap_or_else(|_| Utc::now());

        let mut metadata = BlobMetadata::for_write(key, &data, &UploadMetadata::default());
        metadata.content_type = Some(detect_content_type(None, &data));
        metadata.time_created = modified;
        metadata.updated = modified;
        Ok(metadata)
    }
}

#[async_trait]
impl BlobStore for LocalBlobStore {
    async fn put(
        &self,
        key: &str,
        data: &[u8],
        metadata: &UploadMetadata,
    ) -> Result<BlobMetadata> {
        let path = self.object_path(key)?;
        Self::write_file(&path, data).await?;

        let metadata = BlobMetadata::for_write(key, data, metadata);
        self.write_metadata(key, &metadata).await?;

        debug!(key = %key, path = ?path, size = data.len(), "blob written");
        Ok(metadata)
    }

    async fn metadata(&self, key: &str) -> Result<BlobMetadata> {
        let path = self.object_path(key)?;
        match fs::read(self.metadata_path(key)).await {
            Ok(json) => serde_json::from_slice(&json).context("failed to parse metadata sidecar"),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                self.synthesize_metadata(key, &path).await
            }
            Err(e) => Err(e).context("failed to read metadata sidecar"),
        }
    }

    async fn update_metadata(&self, key: &str, update: &MetadataUpdate) -> Result<BlobMetadata> {
        let mut metadata = self.metadata(key).await?;
        update.apply_to(&mut metadata);
        self.write_metadata(key, &metadata).await?;
        debug!(key = %key, "blob metadata updated");
        Ok(metadata)
    }

    async fn delete(&self, key: &str) -> Result<()> {
        let path = self.object_path(key)?;

        if fs::try_exists(&path).await.unwrap_or(false) {
            fs::remove_file(&path)
                .await
                .context("failed to delete file")?;
            debug!(key = %key, "blob deleted");
        } else {
            warn!(key = %key, "blob not found for deletion");
        }

        let sidecar = self.metadata_path(key);
        if fs::try_exists(&sidecar).await.unwrap_or(false) {
            fs::remove_file(&sidecar)
                .await
                .context("failed to delete metadata sidecar")?;
        }

        Ok(())
    }

    fn download_url(&self, key: &str) -> String {
        format!("{}/{}", self.base_url.trim_end_matches('/'), encode_key(key))
    }

    async fn signed_url(&self, key: &str, expires: DateTime<Utc>) -> Result<String> {
        let url = self.download_url(key);
        match &self.signer {
            Some(signer) => signer.sign(&url, key, expires),
            None => {
                warn!(key = %key, "no URL signing secret configured, link is unsigned");
                Ok(format!("{url}?expires={}", expires.timestamp()))
            }
        }
    }

    fn key_from_url(&self, url: &str) -> Option<String> {
        let base = self.base_url.trim_end_matches('/');
        let path = url.strip_prefix(base)?.strip_prefix('/')?;
        let path = path.split(['?', '#']).next().unwrap_or(path);
        decode_key(path)
    }

    fn scheme(&self) -> &'static str {
        "local"
    }
}

impl std::fmt::Debug for LocalBlobStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LocalBlobStore")
            .field("base_path", &self.base_path)
            .field("base_url", &self.base_url)
            .field("signed", &self.signer.is_some())
            .finish()
    }
}
