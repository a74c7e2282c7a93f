//! Flamelink media storage core.
//!
//! Uploads files into a blob store and records them in a document store,
//! producing resized variants for images. URLs resolve to the closest stored
//! variant, and deletion cascades over every variant before the record goes.
//!
//! Backends are injected through the [`DocumentStore`], [`BlobStore`],
//! [`ImageResizer`] and [`SettingsProvider`] traits; [`StorageConfig`] wires
//! the bundled implementations from environment variables.

pub mod blob;
pub mod config;
pub mod context;
pub mod document;
pub mod error;
pub mod models;
pub mod paths;
pub mod planner;
pub mod resize;
pub mod service;
pub mod settings;

pub use blob::{
    BlobMetadata, BlobStore, LocalBlobStore, MemoryBlobStore, MetadataUpdate, StringEncoding,
    UploadMetadata, UrlSigner,
};
#[cfg(feature = "s3")]
pub use blob::S3BlobStore;
pub use config::{BlobBackend, StorageConfig};
pub use context::{Anonymous, AuthContext, ExecutionContext, ExecutionMode, FixedUser};
pub use document::{Document, DocumentStore, MemoryDocumentStore, PgDocumentStore};
pub use error::{PartialOperation, StorageError, StorageResult};
pub use models::{
    File, Folder, FolderKey, FolderNode, MediaType, REQUIRED_BASELINE_WIDTH, SizeRequest, SizeSpec,
};
pub use resize::{ImageCrateResizer, ImageResizer};
pub use service::{
    DeletedFile, FileData, FolderLookup, GetFilesOptions, StorageService, UpdateMetadataOptions,
    UploadOptions, UploadResult, UrlOptions,
};
pub use settings::{DocumentSettings, SettingsProvider, StaticSettings};
