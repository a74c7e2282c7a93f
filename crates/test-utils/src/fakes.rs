//! Fake collaborators for driving the storage service into specific paths.

use std::collections::BTreeSet;
use std::sync::Arc;

use anyhow::{Result, anyhow, bail};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use flamelink_storage::blob::{
    BlobMetadata, BlobStore, MemoryBlobStore, MetadataUpdate, UploadMetadata,
};
use flamelink_storage::document::{Document, DocumentStore, MemoryDocumentStore};
use flamelink_storage::{AuthContext, ImageResizer, SettingsProvider, SizeSpec};
use parking_lot::Mutex;
use serde_json::Value;

/// Label used for a size in fake output and in recorded calls.
pub fn size_label(spec: &SizeSpec) -> String {
    spec.path
        .clone()
        .filter(|p| !p.is_empty())
        .or_else(|| spec.width.or(spec.max_width).map(|w| w.to_string()))
        .unwrap_or_else(|| "?".to_string())
}

/// Resizer that records every request and returns `resized:{label}` bytes.
#[derive(Debug, Default)]
pub struct RecordingResizer {
    calls: Mutex<Vec<SizeSpec>>,
}

impl RecordingResizer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sizes requested so far, in call order.
    pub fn calls(&self) -> Vec<SizeSpec> {
        self.calls.lock().clone()
    }

    /// Output bytes produced for `spec`.
    pub fn output_for(spec: &SizeSpec) -> Vec<u8> {
        format!("resized:{}", size_label(spec)).into_bytes()
    }
}

#[async_trait]
impl ImageResizer for RecordingResizer {
    async fn resize(&self, _original: &[u8], spec: &SizeSpec) -> Result<Vec<u8>> {
        self.calls.lock().push(spec.clone());
        Ok(Self::output_for(spec))
    }
}

/// Resizer that fails for one width and succeeds for the others.
#[derive(Debug)]
pub struct FailingResizer {
    width: u32,
}

impl FailingResizer {
    pub fn for_width(width: u32) -> Self {
        Self { width }
    }
}

#[async_trait]
impl ImageResizer for FailingResizer {
    async fn resize(&self, _original: &[u8], spec: &SizeSpec) -> Result<Vec<u8>> {
        if spec.effective_width() == Some(self.width) {
            bail!("resize to {} failed", self.width);
        }
        Ok(RecordingResizer::output_for(spec))
    }
}

/// Blob store over [`MemoryBlobStore`] that fails writes or deletes of keys
/// containing a configured fragment.
#[derive(Debug, Default)]
pub struct FaultyBlobStore {
    inner: MemoryBlobStore,
    failing_puts: Mutex<BTreeSet<String>>,
    failing_deletes: Mutex<BTreeSet<String>>,
    deleted: Mutex<Vec<String>>,
}

impl FaultyBlobStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail every put whose key contains `fragment`.
    pub fn fail_puts_containing(&self, fragment: impl Into<String>) {
        self.failing_puts.lock().insert(fragment.into());
    }

    /// Fail every delete whose key contains `fragment`.
    pub fn fail_deletes_containing(&self, fragment: impl Into<String>) {
        self.failing_deletes.lock().insert(fragment.into());
    }

    /// The wrapped store.
    pub fn inner(&self) -> &MemoryBlobStore {
        &self.inner
    }

    /// Keys passed to `delete`, in call order, including missing ones.
    pub fn delete_calls(&self) -> Vec<String> {
        self.deleted.lock().clone()
    }

    fn matches(fragments: &Mutex<BTreeSet<String>>, key: &str) -> bool {
        fragments.lock().iter().any(|f| key.contains(f.as_str()))
    }
}

#[async_trait]
impl BlobStore for FaultyBlobStore {
    async fn put(&self, key: &str, data: &[u8], metadata: &UploadMetadata) -> Result<BlobMetadata> {
        if Self::matches(&self.failing_puts, key) {
            bail!("injected put failure for {key}");
        }
        self.inner.put(key, data, metadata).await
    }

    async fn metadata(&self, key: &str) -> Result<BlobMetadata> {
        self.inner.metadata(key).await
    }

    async fn update_metadata(&self, key: &str, update: &MetadataUpdate) -> Result<BlobMetadata> {
        self.inner.update_metadata(key, update).await
    }

    async fn delete(&self, key: &str) -> Result<()> {
        self.deleted.lock().push(key.to_string());
        if Self::matches(&self.failing_deletes, key) {
            bail!("injected delete failure for {key}");
        }
        self.inner.delete(key).await
    }

    fn download_url(&self, key: &str) -> String {
        self.inner.download_url(key)
    }

    async fn signed_url(&self, key: &str, expires: DateTime<Utc>) -> Result<String> {
        self.inner.signed_url(key, expires).await
    }

    fn key_from_url(&self, url: &str) -> Option<String> {
        self.inner.key_from_url(url)
    }

    fn scheme(&self) -> &'static str {
        "faulty-memory"
    }
}

/// Document store over [`MemoryDocumentStore`] that can refuse writes and
/// deletes, and counts reads.
#[derive(Debug, Default)]
pub struct FaultyDocumentStore {
    inner: MemoryDocumentStore,
    fail_writes: Mutex<bool>,
    fail_deletes: Mutex<bool>,
    fail_reads: Mutex<bool>,
    reads: Mutex<usize>,
}

impl FaultyDocumentStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_writes(&self) {
        *self.fail_writes.lock() = true;
    }

    pub fn fail_deletes(&self) {
        *self.fail_deletes.lock() = true;
    }

    pub fn fail_reads(&self) {
        *self.fail_reads.lock() = true;
    }

    /// Number of `get`, `list` and `query_eq` calls so far.
    pub fn reads(&self) -> usize {
        *self.reads.lock()
    }

    pub fn inner(&self) -> &MemoryDocumentStore {
        &self.inner
    }

    fn read(&self) -> Result<()> {
        *self.reads.lock() += 1;
        if *self.fail_reads.lock() {
            return Err(anyhow!("injected read failure"));
        }
        Ok(())
    }
}

#[async_trait]
impl DocumentStore for FaultyDocumentStore {
    async fn get(&self, collection: &str, id: &str) -> Result<Option<Value>> {
        self.read()?;
        self.inner.get(collection, id).await
    }

    async fn list(&self, collection: &str) -> Result<Vec<Document>> {
        self.read()?;
        self.inner.list(collection).await
    }

    async fn query_eq(
        &self,
        collection: &str,
        field: &str,
        value: &Value,
    ) -> Result<Vec<Document>> {
        self.read()?;
        self.inner.query_eq(collection, field, value).await
    }

    async fn set(&self, collection: &str, id: &str, data: Value) -> Result<()> {
        if *self.fail_writes.lock() {
            bail!("injected write failure for {collection}/{id}");
        }
        self.inner.set(collection, id, data).await
    }

    async fn merge(&self, collection: &str, id: &str, patch: Value) -> Result<Value> {
        if *self.fail_writes.lock() {
            bail!("injected write failure for {collection}/{id}");
        }
        self.inner.merge(collection, id, patch).await
    }

    async fn delete(&self, collection: &str, id: &str) -> Result<bool> {
        if *self.fail_deletes.lock() {
            bail!("injected delete failure for {collection}/{id}");
        }
        self.inner.delete(collection, id).await
    }
}

/// Settings whose default sizes can change between uploads.
#[derive(Debug, Default)]
pub struct MutableSettings {
    image_sizes: Mutex<Option<Vec<SizeSpec>>>,
}

impl MutableSettings {
    pub fn new(image_sizes: Option<Vec<SizeSpec>>) -> Arc<Self> {
        Arc::new(Self {
            image_sizes: Mutex::new(image_sizes),
        })
    }

    pub fn set(&self, image_sizes: Option<Vec<SizeSpec>>) {
        *self.image_sizes.lock() = image_sizes;
    }
}

#[async_trait]
impl SettingsProvider for MutableSettings {
    async fn image_sizes(&self) -> Result<Option<Vec<SizeSpec>>> {
        Ok(self.image_sizes.lock().clone())
    }
}

/// Signed-in user whose id can be swapped mid-test.
#[derive(Debug, Default)]
pub struct SwitchableUser {
    user_id: Mutex<Option<String>>,
}

impl SwitchableUser {
    pub fn signed_in(user_id: impl Into<String>) -> Arc<Self> {
        Arc::new(Self {
            user_id: Mutex::new(Some(user_id.into())),
        })
    }

    pub fn sign_out(&self) {
        *self.user_id.lock() = None;
    }
}

impl AuthContext for SwitchableUser {
    fn current_user_id(&self) -> Option<String> {
        self.user_id.lock().clone()
    }
}
