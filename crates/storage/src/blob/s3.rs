//! S3-compatible object storage.

use std::collections::{BTreeMap, HashMap};
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use aws_sdk_s3::presigning::PresigningConfig;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::types::MetadataDirective;
use chrono::{DateTime, Utc};
use tracing::{debug, warn};

use crate::models::{FILE_ID_METADATA_KEY, FOLDER_ID_METADATA_KEY};

use super::{
    BlobMetadata, BlobStore, MetadataUpdate, UploadMetadata, decode_key, encode_key, validate_key,
};

/// SigV4 presigned URLs cannot outlive a week.
const MAX_PRESIGN_DURATION: Duration = Duration::from_secs(7 * 24 * 60 * 60);

/// Blob store on an S3 bucket.
///
/// S3 lowercases user metadata names; the `flamelink*` keys are restored to
/// their canonical spelling on read.
pub struct S3BlobStore {
    client: aws_sdk_s3::Client,
    bucket: String,
    /// Optional prefix for all keys.
    prefix: Option<String>,
    /// Base URL for public access (e.g., CloudFront distribution).
    base_url: String,
}

impl S3BlobStore {
    /// Create a store using the default AWS credential chain.
    pub async fn new(
        bucket: impl Into<String>,
        prefix: Option<String>,
        base_url: impl Into<String>,
    ) -> Self {
        let config = aws_config::load_from_env().await;
        Self::from_client(aws_sdk_s3::Client::new(&config), bucket, prefix, base_url)
    }

    /// Create with a custom endpoint (MinIO and similar).
    pub async fn with_endpoint(
        endpoint_url: &str,
        bucket: impl Into<String>,
        prefix: Option<String>,
        base_url: impl Into<String>,
    ) -> Self {
        let config = aws_config::from_env()
            .endpoint_url(endpoint_url)
            .load()
            .await;
        let s3_config = aws_sdk_s3::config::Builder::from(&config)
            .force_path_style(true)
            .build();
        Self::from_client(
            aws_sdk_s3::Client::from_conf(s3_config),
            bucket,
            prefix,
            base_url,
        )
    }

    fn from_client(
        client: aws_sdk_s3::Client,
        bucket: impl Into<String>,
        prefix: Option<String>,
        base_url: impl Into<String>,
    ) -> Self {
        Self {
            client,
            bucket: bucket.into(),
            prefix: prefix.filter(|p| !p.trim_matches('/').is_empty()),
            base_url: base_url.into(),
        }
    }

    /// Full object key in the bucket.
    fn object_key(&self, key: &str) -> Result<String> {
        validate_key(key)?;
        Ok(match &self.prefix {
            Some(prefix) => format!("{}/{key}", prefix.trim_matches('/')),
            None => key.to_string(),
        })
    }

    async fn head(&self, key: &str) -> Result<BlobMetadata> {
        let object_key = self.object_key(key)?;
        let head = self
            .client
            .head_object()
            .bucket(&self.bucket)
            .key(&object_key)
            .send()
            .await
            .with_context(|| format!("failed to read S3 object metadata: {key}"))?;

        let updated = head
            .last_modified()
            .and_then(|t| DateTime::<Utc>::from_timestamp(t.secs(), t.subsec_nanos()))
            .unwrap_or_else(Utc::now);

        Ok(BlobMetadata {
            name: key.rsplit('/').next().unwrap_or(key).to_string(),
            full_path: key.to_string(),
            content_type: head.content_type().map(str::to_string),
            size: head
                .content_length()
                .and_then(|len| u64::try_from(len).ok())
                .unwrap_or_default(),
            time_created: updated,
            updated,
            cache_control: head.cache_control().map(str::to_string),
            content_disposition: head.content_disposition().map(str::to_string),
            content_encoding: head.content_encoding().map(str::to_string),
            content_language: head.content_language().map(str::to_string),
            custom_metadata: head
                .metadata()
                .map(|m| {
                    m.iter()
                        .map(|(k, v)| (canonical_metadata_key(k), v.clone()))
                        .collect()
                })
                .unwrap_or_default(),
        })
    }
}

fn canonical_metadata_key(key: &str) -> String {
    [FILE_ID_METADATA_KEY, FOLDER_ID_METADATA_KEY]
        .into_iter()
        .find(|known| known.eq_ignore_ascii_case(key))
        .map_or_else(|| key.to_string(), str::to_string)
}

fn to_s3_metadata(custom: &BTreeMap<String, String>) -> Option<HashMap<String, String>> {
    (!custom.is_empty()).then(|| custom.iter().map(|(k, v)| (k.clone(), v.clone())).collect())
}

#[async_trait]
impl BlobStore for S3BlobStore {
    async fn put(
        &self,
        key: &str,
        data: &[u8],
        metadata: &UploadMetadata,
    ) -> Result<BlobMetadata> {
        let object_key = self.object_key(key)?;
        let written = BlobMetadata::for_write(key, data, metadata);

        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(&object_key)
            .body(ByteStream::from(data.to_vec()))
            .set_content_type(written.content_type.clone())
            .set_cache_control(written.cache_control.clone())
            .set_content_disposition(written.content_disposition.clone())
            .set_content_encoding(written.content_encoding.clone())
            .set_content_language(written.content_language.clone())
            .set_metadata(to_s3_metadata(&written.custom_metadata))
            .send()
            .await
            .context("failed to upload to S3")?;

        debug!(key = %key, object_key = %object_key, size = data.len(), "blob written to S3");
        Ok(written)
    }

    async fn metadata(&self, key: &str) -> Result<BlobMetadata> {
        self.head(key).await
    }

    /// S3 objects are immutable; metadata changes copy the object onto itself.
    async fn update_metadata(&self, key: &str, update: &MetadataUpdate) -> Result<BlobMetadata> {
        let mut metadata = self.head(key).await?;
        update.apply_to(&mut metadata);

        let object_key = self.object_key(key)?;
        self.client
            .copy_object()
            .bucket(&self.bucket)
            .key(&object_key)
            .copy_source(format!("{}/{}", self.bucket, encode_key(&object_key)))
            .metadata_directive(MetadataDirective::Replace)
            .set_content_type(metadata.content_type.clone())
            .set_cache_control(metadata.cache_control.clone())
            .set_content_disposition(metadata.content_disposition.clone())
            .set_content_encoding(metadata.content_encoding.clone())
            .set_content_language(metadata.content_language.clone())
            .set_metadata(to_s3_metadata(&metadata.custom_metadata))
            .send()
            .await
            .context("failed to update S3 object metadata")?;

        metadata.updated = Utc::now();
        debug!(key = %key, "blob metadata updated in S3");
        Ok(metadata)
    }

    async fn delete(&self, key: &str) -> Result<()> {
        let object_key = self.object_key(key)?;

        self.client
            .delete_object()
            .bucket(&self.bucket)
            .key(&object_key)
            .send()
            .await
            .context("failed to delete from S3")?;

        debug!(key = %key, "blob deleted from S3");
        Ok(())
    }

    fn download_url(&self, key: &str) -> String {
        let base = self.base_url.trim_end_matches('/');
        match &self.prefix {
            Some(prefix) => format!("{base}/{}/{}", prefix.trim_matches('/'), encode_key(key)),
            None => format!("{base}/{}", encode_key(key)),
        }
    }

    async fn signed_url(&self, key: &str, expires: DateTime<Utc>) -> Result<String> {
        let object_key = self.object_key(key)?;
        let requested = (expires - Utc::now())
            .to_std()
            .context("signed URL expiry is in the past")?;
        if requested > MAX_PRESIGN_DURATION {
            warn!(key = %key, %expires, "S3 presigned URL expiry clamped to 7 days");
        }

        let config = PresigningConfig::expires_in(requested.min(MAX_PRESIGN_DURATION))
            .context("invalid presigning configuration")?;
        let request = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(&object_key)
            .presigned(config)
            .await
            .context("failed to presign S3 URL")?;

        Ok(request.uri().to_string())
    }

    fn key_from_url(&self, url: &str) -> Option<String> {
        let mut path = url
            .strip_prefix(self.base_url.trim_end_matches('/'))?
            .strip_prefix('/')?;
        if let Some(prefix) = &self.prefix {
            path = path
                .strip_prefix(prefix.trim_matches('/'))?
                .strip_prefix('/')?;
        }
        let path = path.split(['?', '#']).next().unwrap_or(path);
        decode_key(path)
    }

    fn scheme(&self) -> &'static str {
        "s3"
    }
}

impl std::fmt::Debug for S3BlobStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("S3BlobStore")
            .field("bucket", &self.bucket)
            .field("prefix", &self.prefix)
            .field("base_url", &self.base_url)
            .finish()
    }
}
