//! Module-level settings consulted during uploads.

use std::sync::Arc;

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde_json::Value;

use crate::document::DocumentStore;
use crate::models::SizeSpec;

/// Collection holding CMS settings documents.
pub const SETTINGS_COLLECTION: &str = "fl_settings";

/// Document within [`SETTINGS_COLLECTION`] holding general settings.
pub const GENERAL_SETTINGS_ID: &str = "general";

/// Field of the general settings document listing default image sizes.
pub const IMAGE_SIZES_FIELD: &str = "imageSizes";

/// Source of default image size variants.
#[async_trait]
pub trait SettingsProvider: Send + Sync {
    /// Default sizes applied to every image upload, if configured.
    async fn image_sizes(&self) -> Result<Option<Vec<SizeSpec>>>;
}

/// Settings fixed at construction.
#[derive(Debug, Clone, Default)]
pub struct StaticSettings {
    image_sizes: Option<Vec<SizeSpec>>,
}

impl StaticSettings {
    pub fn new(image_sizes: Option<Vec<SizeSpec>>) -> Self {
        Self { image_sizes }
    }
}

#[async_trait]
impl SettingsProvider for StaticSettings {
    async fn image_sizes(&self) -> Result<Option<Vec<SizeSpec>>> {
        Ok(self.image_sizes.clone())
    }
}

/// Reads `fl_settings/general.imageSizes` from the document store on every call.
pub struct DocumentSettings {
    documents: Arc<dyn DocumentStore>,
}

impl DocumentSettings {
    pub fn new(documents: Arc<dyn DocumentStore>) -> Self {
        Self { documents }
    }
}

#[async_trait]
impl SettingsProvider for DocumentSettings {
    async fn image_sizes(&self) -> Result<Option<Vec<SizeSpec>>> {
        let general = self
            .documents
            .get(SETTINGS_COLLECTION, GENERAL_SETTINGS_ID)
            .await
            .context("failed to read general settings")?;

        match general.as_ref().and_then(|doc| doc.get(IMAGE_SIZES_FIELD)) {
            None | Some(Value::Null) => Ok(None),
            Some(sizes) => serde_json::from_value(sizes.clone())
                .map(Some)
                .context("malformed imageSizes setting"),
        }
    }
}

impl std::fmt::Debug for DocumentSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DocumentSettings").finish_non_exhaustive()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::document::MemoryDocumentStore;
    use serde_json::json;

    #[tokio::test]
    async fn reads_image_sizes_from_general_settings() {
        let docs = Arc::new(MemoryDocumentStore::new());
        docs.set(
            SETTINGS_COLLECTION,
            GENERAL_SETTINGS_ID,
            json!({ "imageSizes": [{ "width": "100" }, { "maxWidth": 900 }] }),
        )
        .await
        .unwrap();

        let sizes = DocumentSettings::new(docs).image_sizes().await.unwrap();
        assert_eq!(
            sizes,
            Some(vec![SizeSpec::width(100), SizeSpec::max_width(900)])
        );
    }

    #[tokio::test]
    async fn missing_document_or_field_means_no_defaults() {
        let docs = Arc::new(MemoryDocumentStore::new());
        let settings = DocumentSettings::new(docs.clone());
        assert_eq!(settings.image_sizes().await.unwrap(), None);

        docs.set(SETTINGS_COLLECTION, GENERAL_SETTINGS_ID, json!({ "locale": "en" }))
            .await
            .unwrap();
        assert_eq!(settings.image_sizes().await.unwrap(), None);
    }

    #[tokio::test]
    async fn malformed_sizes_fail() {
        let docs = Arc::new(MemoryDocumentStore::new());
        docs.set(
            SETTINGS_COLLECTION,
            GENERAL_SETTINGS_ID,
            json!({ "imageSizes": "large" }),
        )
        .await
        .unwrap();
        assert!(DocumentSettings::new(docs).image_sizes().await.is_err());
    }
}
