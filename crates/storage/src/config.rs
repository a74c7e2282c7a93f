//! Configuration loaded from environment variables.

use std::env;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use tracing::info;

use crate::blob::{BlobStore, LocalBlobStore, MemoryBlobStore, UrlSigner};
use crate::document::{DocumentStore, MemoryDocumentStore, PgDocumentStore};
use crate::resize::{DEFAULT_MAX_CONCURRENT_RESIZES, ImageCrateResizer};
use crate::service::StorageService;
use crate::settings::DocumentSettings;

/// Which blob store to use.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlobBackend {
    Local,
    Memory,
    S3,
}

impl std::str::FromStr for BlobBackend {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "local" => Ok(Self::Local),
            "memory" => Ok(Self::Memory),
            "s3" => Ok(Self::S3),
            other => bail!("STORAGE_BACKEND must be local, memory or s3, got {other:?}"),
        }
    }
}

/// S3 bucket settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct S3Settings {
    pub bucket: String,
    /// Optional prefix for all keys.
    pub prefix: Option<String>,
    /// Custom endpoint for S3-compatible services.
    pub endpoint: Option<String>,
    /// Base URL objects are publicly served from.
    pub public_url: String,
}

/// Storage configuration.
#[derive(Clone)]
pub struct StorageConfig {
    /// Blob store selection (default: local).
    pub backend: BlobBackend,

    /// Path to uploads directory (default: ./uploads).
    pub uploads_dir: PathBuf,

    /// Base URL for serving uploaded files (default: /files).
    pub files_url: String,

    /// Secret for HMAC-signed URLs from the local and memory stores.
    pub url_signing_secret: Option<String>,

    /// Present when `backend` is S3.
    pub s3: Option<S3Settings>,

    /// PostgreSQL connection URL. Without one, documents live in memory.
    pub database_url: Option<String>,

    /// Maximum database connections in pool (default: 10).
    pub database_max_connections: u32,

    /// Concurrent image resizes (default: 4).
    pub max_concurrent_resizes: usize,
}

impl StorageConfig {
    /// Load `.env` if present, then read the environment.
    pub fn load() -> Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_env()
    }

    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Build configuration from an arbitrary variable source.
    pub fn from_lookup(var: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let var = |name: &str| var(name).filter(|v| !v.trim().is_empty());

        let backend: BlobBackend = var("STORAGE_BACKEND")
            .unwrap_or_else(|| "local".to_string())
            .parse()?;

        let uploads_dir = var("UPLOADS_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("./uploads"));

        let files_url = var("FILES_URL").unwrap_or_else(|| "/files".to_string());
        if files_url.contains("://") {
            url::Url::parse(&files_url).context("FILES_URL must be a valid URL or path")?;
        }

        let url_signing_secret = var("URL_SIGNING_SECRET");

        let s3 = if backend == BlobBackend::S3 {
            let bucket =
                var("S3_BUCKET").context("S3_BUCKET is required when STORAGE_BACKEND=s3")?;
            let endpoint = var("S3_ENDPOINT");
            if let Some(endpoint) = &endpoint {
                url::Url::parse(endpoint).context("S3_ENDPOINT must be a valid URL")?;
            }
            let public_url = var("S3_PUBLIC_URL")
                .unwrap_or_else(|| format!("https://{bucket}.s3.amazonaws.com"));
            url::Url::parse(&public_url).context("S3_PUBLIC_URL must be a valid URL")?;

            Some(S3Settings {
                bucket,
                prefix: var("S3_PREFIX"),
                endpoint,
                public_url,
            })
        } else {
            None
        };

        let database_url = var("DATABASE_URL");

        let database_max_connections = var("DATABASE_MAX_CONNECTIONS")
            .unwrap_or_else(|| "10".to_string())
            .parse()
            .context("DATABASE_MAX_CONNECTIONS must be a valid u32")?;

        let max_concurrent_resizes = match var("MAX_CONCURRENT_RESIZES") {
            Some(v) => v
                .parse()
                .context("MAX_CONCURRENT_RESIZES must be a positive integer")?,
            None => DEFAULT_MAX_CONCURRENT_RESIZES,
        };
        if max_concurrent_resizes == 0 {
            bail!("MAX_CONCURRENT_RESIZES must be a positive integer");
        }

        Ok(Self {
            backend,
            uploads_dir,
            files_url,
            url_signing_secret,
            s3,
            database_url,
            database_max_connections,
            max_concurrent_resizes,
        })
    }

    fn signer(&self) -> Option<UrlSigner> {
        self.url_signing_secret.as_deref().map(UrlSigner::new)
    }

    /// Construct the configured blob store.
    pub async fn blob_store(&self) -> Result<Arc<dyn BlobStore>> {
        let store: Arc<dyn BlobStore> = match self.backend {
            BlobBackend::Local => {
                let mut store = LocalBlobStore::new(&self.uploads_dir, &self.files_url);
                if let Some(signer) = self.signer() {
                    store = store.with_signer(signer);
                }
                Arc::new(store)
            }
            BlobBackend::Memory => {
                let mut store = MemoryBlobStore::new();
                if let Some(signer) = self.signer() {
                    store = store.with_signer(signer);
                }
                Arc::new(store)
            }
            BlobBackend::S3 => self.s3_store().await?,
        };
        Ok(store)
    }

    #[cfg(feature = "s3")]
    async fn s3_store(&self) -> Result<Arc<dyn BlobStore>> {
        use crate::blob::S3BlobStore;

        let s3 = self
            .s3
            .as_ref()
            .context("S3 settings missing for the s3 backend")?;
        let store = match &s3.endpoint {
            Some(endpoint) => {
                S3BlobStore::with_endpoint(
                    endpoint,
                    &s3.bucket,
                    s3.prefix.clone(),
                    &s3.public_url,
                )
                .await
            }
            None => S3BlobStore::new(&s3.bucket, s3.prefix.clone(), &s3.public_url).await,
        };
        Ok(Arc::new(store))
    }

    #[cfg(not(feature = "s3"))]
    async fn s3_store(&self) -> Result<Arc<dyn BlobStore>> {
        bail!("STORAGE_BACKEND=s3 requires building with the `s3` feature")
    }

    /// Construct the document store: PostgreSQL when configured, else memory.
    pub async fn document_store(&self) -> Result<Arc<dyn DocumentStore>> {
        match &self.database_url {
            Some(url) => {
                let store = PgDocumentStore::connect(url, self.database_max_connections).await?;
                store.ensure_schema().await?;
                Ok(Arc::new(store))
            }
            None => Ok(Arc::new(MemoryDocumentStore::new())),
        }
    }

    /// Wire up a storage service from this configuration.
    ///
    /// Default image sizes are read from the settings collection of the
    /// document store.
    pub async fn build_service(&self) -> Result<StorageService> {
        let documents = self.document_store().await?;
        let blobs = self.blob_store().await?;
        let resizer = Arc::new(ImageCrateResizer::new(self.max_concurrent_resizes));
        let settings = Arc::new(DocumentSettings::new(documents.clone()));

        info!(
            blobs = blobs.scheme(),
            postgres = self.database_url.is_some(),
            max_concurrent_resizes = self.max_concurrent_resizes,
            "storage service configured"
        );
        Ok(StorageService::new(documents, blobs, resizer, settings))
    }
}

impl std::fmt::Debug for StorageConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StorageConfig")
            .field("backend", &self.backend)
            .field("uploads_dir", &self.uploads_dir)
            .field("files_url", &self.files_url)
            .field("url_signing_secret", &self.url_signing_secret.as_ref().map(|_| "[redacted]"))
            .field("s3", &self.s3)
            .field("database_url", &self.database_url.as_ref().map(|_| "[redacted]"))
            .field("database_max_connections", &self.database_max_connections)
            .field("max_concurrent_resizes", &self.max_concurrent_resizes)
            .finish()
    }
}
