//! In-process blob store.

use std::collections::BTreeMap;

use anyhow::{Result, anyhow};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use tracing::{debug, warn};

use super::{
    BlobMetadata, BlobStore, MetadataUpdate, UploadMetadata, UrlSigner, decode_key, encode_key,
    validate_key,
};

/// Base URL for objects held in memory.
const MEMORY_BASE_URL: &str = "memory://blobs";

#[derive(Debug, Clone)]
struct StoredBlob {
    data: Vec<u8>,
    metadata: BlobMetadata,
}

/// Blob store backed by a map; useful for tests and embedding.
#[derive(Default)]
pub struct MemoryBlobStore {
    objects: RwLock<BTreeMap<String, StoredBlob>>,
    signer: Option<UrlSigner>,
}

impl MemoryBlobStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sign URLs with the given signer.
    pub fn with_signer(mut self, signer: UrlSigner) -> Self {
        self.signer = Some(signer);
        self
    }

    /// Whether an object exists at `key`.
    pub fn contains(&self, key: &str) -> bool {
        self.objects.read().contains_key(key)
    }

    /// Stored bytes at `key`.
    pub fn data(&self, key: &str) -> Option<Vec<u8>> {
        self.objects.read().get(key).map(|blob| blob.data.clone())
    }

    /// All keys, sorted.
    pub fn keys(&self) -> Vec<String> {
        self.objects.read().keys().cloned().collect()
    }

    /// Number of stored objects.
    pub fn len(&self) -> usize {
        self.objects.read().len()
    }

    /// Whether the store is empty.
    pub fn is_empty(&self) -> bool {
        self.objects.read().is_empty()
    }
}

#[async_trait]
impl BlobStore for MemoryBlobStore {
    async fn put(
        &self,
        key: &str,
        data: &[u8],
        metadata: &UploadMetadata,
    ) -> Result<BlobMetadata> {
        validate_key(key)?;
        let metadata = BlobMetadata::for_write(key, data, metadata);
        self.objects.write().insert(
            key.to_string(),
            StoredBlob {
                data: data.to_vec(),
                metadata: metadata.clone(),
            },
        );
        debug!(key = %key, size = data.len(), "blob written to memory");
        Ok(metadata)
    }

    async fn metadata(&self, key: &str) -> Result<BlobMetadata> {
        self.objects
            .read()
            .get(key)
            .map(|blob| blob.metadata.clone())
            .ok_or_else(|| anyhow!("object not found: {key}"))
    }

    async fn update_metadata(&self, key: &str, update: &MetadataUpdate) -> Result<BlobMetadata> {
        let mut objects = self.objects.write();
        let blob = objects
            .get_mut(key)
            .ok_or_else(|| anyhow!("object not found: {key}"))?;
        update.apply_to(&mut blob.metadata);
        Ok(blob.metadata.clone())
    }

    async fn delete(&self, key: &str) -> Result<()> {
        if self.objects.write().remove(key).is_some() {
            debug!(key = %key, "blob deleted from memory");
        } else {
            warn!(key = %key, "blob not found for deletion");
        }
        Ok(())
    }

    fn download_url(&self, key: &str) -> String {
        format!("{MEMORY_BASE_URL}/{}", encode_key(key))
    }

    async fn signed_url(&self, key: &str, expires: DateTime<Utc>) -> Result<String> {
        let url = self.download_url(key);
        match &self.signer {
            Some(signer) => signer.sign(&url, key, expires),
            None => Ok(format!("{url}?expires={}", expires.timestamp())),
        }
    }

    fn key_from_url(&self, url: &str) -> Option<String> {
        let path = url.strip_prefix(MEMORY_BASE_URL)?.strip_prefix('/')?;
        let path = path.split(['?', '#']).next().unwrap_or(path);
        decode_key(path)
    }

    fn scheme(&self) -> &'static str {
        "memory"
    }
}

impl std::fmt::Debug for MemoryBlobStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryBlobStore")
            .field("objects", &self.objects.read().len())
            .finish()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::blob::StringEncoding;

    #[tokio::test]
    async fn put_and_read_back() {
        let store = MemoryBlobStore::new();
        let meta = store
            .put(
                "flamelink/media/1_a.txt",
                b"hello",
                &UploadMetadata::default().with_content_type("text/plain"),
            )
            .await
            .unwrap();

        assert_eq!(meta.name, "1_a.txt");
        assert_eq!(store.data("flamelink/media/1_a.txt").unwrap(), b"hello");
        assert_eq!(
            store
                .metadata("flamelink/media/1_a.txt")
                .await
                .unwrap()
                .content_type
                .as_deref(),
            Some("text/plain")
        );
    }

    #[tokio::test]
    async fn put_string_uses_encoding_content_type() {
        let store = MemoryBlobStore::new();
        let meta = store
            .put_string(
                "flamelink/media/1",
                "data:image/svg+xml;base64,PHN2Zy8+",
                Some(StringEncoding::DataUrl),
                &UploadMetadata::default(),
            )
            .await
            .unwrap();

        assert_eq!(meta.content_type.as_deref(), Some("image/svg+xml"));
        assert_eq!(store.data("flamelink/media/1").unwrap(), b"<svg/>");
    }

    #[tokio::test]
    async fn delete_missing_is_not_an_error() {
        let store = MemoryBlobStore::new();
        store.delete("flamelink/media/missing").await.unwrap();
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn metadata_of_missing_object_fails() {
        let store = MemoryBlobStore::new();
        assert!(store.metadata("flamelink/media/missing").await.is_err());
    }

    #[test]
    fn url_round_trip() {
        let store = MemoryBlobStore::new();
        let url = store.download_url("flamelink/media/1_a b.png");
        assert_eq!(url, "memory://blobs/flamelink/media/1_a%20b.png");
        assert_eq!(
            store.key_from_url(&format!("{url}?alt=media")).as_deref(),
            Some("flamelink/media/1_a b.png")
        );
        assert_eq!(store.key_from_url("https://elsewhere/a.png"), None);
    }
}
