//! Blob storage backends.
//!
//! Provides the trait the storage service writes through, plus in-memory,
//! local filesystem and (with the `s3` feature) S3 implementations.

mod encoding;
mod local;
mod memory;
#[cfg(feature = "s3")]
mod s3;
mod signing;

use std::collections::BTreeMap;

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub use encoding::StringEncoding;
pub use local::LocalBlobStore;
pub use memory::MemoryBlobStore;
#[cfg(feature = "s3")]
pub use s3::S3BlobStore;
pub use signing::UrlSigner;

/// Content type used when neither the caller nor the bytes say otherwise.
pub const DEFAULT_CONTENT_TYPE: &str = "application/octet-stream";

/// Blob storage backend trait.
///
/// Keys are slash-separated paths such as `flamelink/media/1_cat.png`; the
/// storage service owns their layout.
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Write bytes at `key`, replacing any existing object.
    async fn put(
        &self,
        key: &str,
        data: &[u8],
        metadata: &UploadMetadata,
    ) -> Result<BlobMetadata>;

    /// Write a string at `key`, decoding it per `encoding` (raw when `None`).
    async fn put_string(
        &self,
        key: &str,
        data: &str,
        encoding: Option<StringEncoding>,
        metadata: &UploadMetadata,
    ) -> Result<BlobMetadata> {
        let decoded = encoding.unwrap_or_default().decode(data)?;
        let mut metadata = metadata.clone();
        if metadata.content_type.is_none() {
            metadata.content_type = decoded.content_type;
        }
        self.put(key, &decoded.bytes, &metadata).await
    }

    /// Read the metadata of the object at `key`.
    async fn metadata(&self, key: &str) -> Result<BlobMetadata>;

    /// Apply a metadata patch to the object at `key`.
    async fn update_metadata(&self, key: &str, update: &MetadataUpdate) -> Result<BlobMetadata>;

    /// Delete the object at `key`.
    async fn delete(&self, key: &str) -> Result<()>;

    /// Public download URL for `key`.
    fn download_url(&self, key: &str) -> String;

    /// Signed read URL for `key`, valid until `expires`.
    async fn signed_url(&self, key: &str, expires: DateTime<Utc>) -> Result<String>;

    /// Map one of this store's URLs back to its key.
    fn key_from_url(&self, url: &str) -> Option<String>;

    /// Get the storage scheme (e.g., "memory", "local", "s3").
    fn scheme(&self) -> &'static str;
}

/// Caller-settable metadata for a write.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadMetadata {
    /// Original name; used for the stored filename, not sent to the backend.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cache_control: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_disposition: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_encoding: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_language: Option<String>,
    #[serde(default)]
    pub custom_metadata: BTreeMap<String, String>,
}

impl UploadMetadata {
    /// Metadata carrying only a name.
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            ..Self::default()
        }
    }

    /// Set the content type.
    pub fn with_content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = Some(content_type.into());
        self
    }

    /// Add a custom metadata entry.
    pub fn with_custom(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.custom_metadata.insert(key.into(), value.into());
        self
    }
}

/// What a backend reports for a stored object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BlobMetadata {
    /// Last path segment of the key.
    pub name: String,
    pub full_path: String,
    pub content_type: Option<String>,
    pub size: u64,
    pub time_created: DateTime<Utc>,
    pub updated: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cache_control: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_disposition: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_encoding: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_language: Option<String>,
    #[serde(default)]
    pub custom_metadata: BTreeMap<String, String>,
}

impl BlobMetadata {
    /// Metadata for a fresh write of `data` at `key`.
    pub fn for_write(key: &str, data: &[u8], upload: &UploadMetadata) -> Self {
        let now = Utc::now();
        Self {
            name: key.rsplit('/').next().unwrap_or(key).to_string(),
            full_path: key.to_string(),
            content_type: Some(detect_content_type(upload.content_type.as_deref(), data)),
            size: data.len() as u64,
            time_created: now,
            updated: now,
            cache_control: upload.cache_control.clone(),
            content_disposition: upload.content_disposition.clone(),
            content_encoding: upload.content_encoding.clone(),
            content_language: upload.content_language.clone(),
            custom_metadata: upload.custom_metadata.clone(),
        }
    }
}

/// Change to a single optional metadata field.
#[derive(Debug, Clone, Default, PartialEq)]
pub enum Patch<T> {
    #[default]
    Keep,
    Set(T),
    Clear,
}

impl<T: Clone> Patch<T> {
    fn apply(&self, target: &mut Option<T>) {
        match self {
            Self::Keep => {}
            Self::Set(value) => *target = Some(value.clone()),
            Self::Clear => *target = None,
        }
    }

    fn is_keep(&self) -> bool {
        matches!(self, Self::Keep)
    }
}

/// A metadata update.
///
/// Custom entries map to `Some(value)` to set or `None` to remove.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MetadataUpdate {
    pub content_type: Patch<String>,
    pub cache_control: Patch<String>,
    pub content_disposition: Patch<String>,
    pub content_encoding: Patch<String>,
    pub content_language: Patch<String>,
    pub custom_metadata: BTreeMap<String, Option<String>>,
}

impl MetadataUpdate {
    /// Set the content type.
    pub fn content_type(mut self, value: impl Into<String>) -> Self {
        self.content_type = Patch::Set(value.into());
        self
    }

    /// Set the cache control header.
    pub fn cache_control(mut self, value: impl Into<String>) -> Self {
        self.cache_control = Patch::Set(value.into());
        self
    }

    /// Remove the cache control header.
    pub fn clear_cache_control(mut self) -> Self {
        self.cache_control = Patch::Clear;
        self
    }

    /// Set a custom metadata entry.
    pub fn custom(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.custom_metadata.insert(key.into(), Some(value.into()));
        self
    }

    /// Remove a custom metadata entry.
    pub fn remove_custom(mut self, key: impl Into<String>) -> Self {
        self.custom_metadata.insert(key.into(), None);
        self
    }

    /// Whether the update changes nothing.
    pub fn is_empty(&self) -> bool {
        self.content_type.is_keep()
            && self.cache_control.is_keep()
            && self.content_disposition.is_keep()
            && self.content_encoding.is_keep()
            && self.content_language.is_keep()
            && self.custom_metadata.is_empty()
    }

    /// Apply this update to existing metadata, bumping `updated`.
    pub fn apply_to(&self, metadata: &mut BlobMetadata) {
        self.content_type.apply(&mut metadata.content_type);
        self.cache_control.apply(&mut metadata.cache_control);
        self.content_disposition
            .apply(&mut metadata.content_disposition);
        self.content_encoding.apply(&mut metadata.content_encoding);
        self.content_language.apply(&mut metadata.content_language);
        for (key, value) in &self.custom_metadata {
            match value {
                Some(value) => {
                    metadata.custom_metadata.insert(key.clone(), value.clone());
                }
                None => {
                    metadata.custom_metadata.remove(key);
                }
            }
        }
        metadata.updated = Utc::now();
    }
}

/// Pick a content type: explicit, then sniffed from the bytes, then the default.
pub fn detect_content_type(explicit: Option<&str>, data: &[u8]) -> String {
    if let Some(content_type) = explicit.filter(|c| !c.is_empty()) {
        return content_type.to_string();
    }
    infer::get(data)
        .map(|kind| kind.mime_type().to_string())
        .unwrap_or_else(|| DEFAULT_CONTENT_TYPE.to_string())
}

/// Reject keys that could escape a store's root.
pub(crate) fn validate_key(key: &str) -> Result<()> {
    if key.is_empty() || key.starts_with('/') {
        anyhow::bail!("invalid blob key: {key:?}");
    }
    if key.split('/').any(|segment| segment.is_empty() || segment == "..") {
        anyhow::bail!("invalid blob key: {key:?}");
    }
    Ok(())
}

/// URL-encode each path segment of a key.
pub(crate) fn encode_key(key: &str) -> String {
    key.split('/')
        .map(|segment| urlencoding::encode(segment).into_owned())
        .collect::<Vec<_>>()
        .join("/")
}

/// Reverse of [`encode_key`].
pub(crate) fn decode_key(encoded: &str) -> Option<String> {
    let decoded: Result<Vec<String>, _> = encoded
        .split('/')
        .map(|segment| urlencoding::decode(segment).map(|s| s.into_owned()))
        .collect();
    decoded.ok().map(|segments| segments.join("/"))
}
