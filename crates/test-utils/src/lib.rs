//! Flamelink storage test utilities.
//!
//! Fixtures for folders, files and image bytes, fake collaborators, and a
//! [`TestStorage`] harness wiring them into a [`StorageService`].

// Test support code panics on broken fixtures.
#![allow(clippy::unwrap_used, clippy::expect_used)]

pub mod fakes;

use std::io::Cursor;
use std::sync::Arc;

use flamelink_storage::document::DocumentStore;
use flamelink_storage::models::FileMeta;
use flamelink_storage::service::{FILES_COLLECTION, FOLDERS_COLLECTION};
use flamelink_storage::{
    ExecutionContext, File, Folder, FolderKey, ImageResizer, MediaType, SizeSpec, StorageService,
};
use image::{DynamicImage, ImageFormat, RgbImage};
use parking_lot::Mutex;

pub use fakes::{
    FailingResizer, FaultyBlobStore, FaultyDocumentStore, MutableSettings, RecordingResizer,
    SwitchableUser,
};

/// Install a test-friendly tracing subscriber once. Honors `RUST_LOG`.
pub fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_test_writer()
        .try_init();
}

/// Log lines captured by a thread-local subscriber.
///
/// Holds the subscriber installed for the current thread until dropped, so
/// use it from `#[tokio::test]` (current-thread runtime).
pub struct LogCapture {
    buffer: Arc<Mutex<Vec<u8>>>,
    _guard: tracing::subscriber::DefaultGuard,
}

impl LogCapture {
    /// Capture `WARN` and above emitted on this thread.
    pub fn warnings() -> Self {
        let buffer = Arc::new(Mutex::new(Vec::new()));
        let writer = buffer.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_max_level(tracing::Level::WARN)
            .with_ansi(false)
            .with_writer(move || CaptureWriter(writer.clone()))
            .finish();
        Self {
            buffer,
            _guard: tracing::subscriber::set_default(subscriber),
        }
    }

    /// Everything written so far.
    pub fn contents(&self) -> String {
        String::from_utf8_lossy(&self.buffer.lock()).into_owned()
    }
}

impl std::fmt::Debug for LogCapture {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LogCapture")
            .field("bytes", &self.buffer.lock().len())
            .finish_non_exhaustive()
    }
}

struct CaptureWriter(Arc<Mutex<Vec<u8>>>);

impl std::io::Write for CaptureWriter {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0.lock().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

/// Create a top-level folder.
pub fn test_folder(id: &str, name: &str) -> Folder {
    Folder {
        id: id.into(),
        name: name.to_string(),
        parent_id: None,
    }
}

/// Create a folder nested under `parent`.
pub fn child_folder(id: &str, name: &str, parent: &str) -> Folder {
    Folder {
        parent_id: Some(parent.into()),
        ..test_folder(id, name)
    }
}

/// Width-only size specs.
pub fn widths(widths: &[u32]) -> Vec<SizeSpec> {
    widths.iter().copied().map(SizeSpec::width).collect()
}

/// A solid-color PNG.
pub fn png_bytes(width: u32, height: u32) -> Vec<u8> {
    let img = DynamicImage::ImageRgb8(RgbImage::from_pixel(width, height, [200, 80, 40].into()));
    let mut buf = Cursor::new(Vec::new());
    img.write_to(&mut buf, ImageFormat::Png).unwrap();
    buf.into_inner()
}

/// Create a file record fixture stored as `{id}_{name}`.
pub fn test_file(id: &str, name: &str) -> TestFile {
    TestFile {
        file: File {
            id: id.to_string(),
            file: format!("{id}_{name}"),
            folder_id: None,
            media_type: MediaType::Files,
            content_type: "application/octet-stream".to_string(),
            sizes: None,
            meta: FileMeta {
                created_by: "test-user".to_string(),
                created_date: "2026-01-01T00:00:00.000Z".to_string(),
            },
        },
    }
}

/// A file record builder.
#[derive(Debug, Clone)]
pub struct TestFile {
    file: File,
}

impl TestFile {
    /// Mark as a PNG image.
    pub fn image(mut self) -> Self {
        self.file.media_type = MediaType::Images;
        self.file.content_type = "image/png".to_string();
        self
    }

    /// Set the stored variants.
    pub fn with_sizes(mut self, sizes: Vec<SizeSpec>) -> Self {
        self.file.sizes = Some(sizes);
        self
    }

    /// Place in a folder.
    pub fn in_folder(mut self, folder_id: impl Into<FolderKey>) -> Self {
        self.file.folder_id = Some(folder_id.into());
        self
    }

    /// Replace the stored `file` value, e.g. with a full URL.
    pub fn with_file(mut self, file: impl Into<String>) -> Self {
        self.file.file = file.into();
        self
    }

    pub fn build(self) -> File {
        self.file
    }
}

/// In-memory backends plus fakes, ready to build services from.
#[derive(Debug)]
pub struct TestStorage {
    pub documents: Arc<FaultyDocumentStore>,
    pub blobs: Arc<FaultyBlobStore>,
    pub resizer: Arc<RecordingResizer>,
    pub settings: Arc<MutableSettings>,
}

impl Default for TestStorage {
    fn default() -> Self {
        Self::new()
    }
}

impl TestStorage {
    /// Empty stores, no default image sizes.
    pub fn new() -> Self {
        Self {
            documents: Arc::new(FaultyDocumentStore::new()),
            blobs: Arc::new(FaultyBlobStore::new()),
            resizer: Arc::new(RecordingResizer::new()),
            settings: MutableSettings::new(None),
        }
    }

    /// Configure module-wide default sizes.
    pub fn with_default_sizes(self, sizes: Vec<SizeSpec>) -> Self {
        self.settings.set(Some(sizes));
        self
    }

    /// A client-mode service.
    pub fn service(&self) -> StorageService {
        self.service_in(ExecutionContext::client())
    }

    /// A service in the given execution context.
    pub fn service_in(&self, context: ExecutionContext) -> StorageService {
        self.service_with_resizer(self.resizer.clone())
            .with_context(context)
    }

    /// A client-mode service with a different resizer.
    pub fn service_with_resizer(&self, resizer: Arc<dyn ImageResizer>) -> StorageService {
        StorageService::new(
            self.documents.clone(),
            self.blobs.clone(),
            resizer,
            self.settings.clone(),
        )
    }

    /// Store a folder record.
    pub async fn seed_folder(&self, folder: &Folder) {
        self.documents
            .inner()
            .set(
                FOLDERS_COLLECTION,
                &folder.id.to_string(),
                serde_json::to_value(folder).unwrap(),
            )
            .await
            .unwrap();
    }

    /// Store a file record.
    pub async fn seed_file(&self, file: &File) {
        self.documents
            .inner()
            .set(FILES_COLLECTION, &file.id, serde_json::to_value(file).unwrap())
            .await
            .unwrap();
    }

    /// Store a blob at `key` with the given bytes.
    pub async fn seed_blob(&self, key: &str, data: &[u8]) {
        use flamelink_storage::blob::{BlobStore, UploadMetadata};

        self.blobs
            .inner()
            .put(key, data, &UploadMetadata::default())
            .await
            .unwrap();
    }

    /// Keys currently held by the blob store.
    pub fn blob_keys(&self) -> Vec<String> {
        self.blobs.inner().keys()
    }
}

/// Assertion helpers for stored state.
pub mod assert {
    use flamelink_storage::MemoryBlobStore;

    /// Assert that a blob exists.
    pub fn blob_exists(store: &MemoryBlobStore, key: &str) {
        assert!(
            store.contains(key),
            "Expected blob '{key}' to exist, have: {:?}",
            store.keys()
        );
    }

    /// Assert that a blob does not exist.
    pub fn blob_missing(store: &MemoryBlobStore, key: &str) {
        assert!(
            !store.contains(key),
            "Expected blob '{key}' to be absent, have: {:?}",
            store.keys()
        );
    }

    /// Assert that a string contains a substring.
    pub fn contains(haystack: &str, needle: &str) {
        assert!(
            haystack.contains(needle),
            "Expected string to contain '{needle}'\nActual: {haystack}"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_file_builder() {
        let file = test_file("1", "cat.png")
            .image()
            .in_folder("7")
            .with_sizes(widths(&[240, 480]))
            .build();

        assert_eq!(file.file, "1_cat.png");
        assert_eq!(file.media_type, MediaType::Images);
        assert_eq!(file.folder_id, Some(FolderKey::from("7")));
        assert_eq!(file.variants().len(), 2);
    }

    #[test]
    fn folders() {
        let child = child_folder("2", "Cats", "1");
        assert_eq!(child.parent_id, Some(FolderKey::from("1")));
        assert_eq!(test_folder("1", "Photos").parent_id, None);
    }

    #[test]
    fn png_fixture_is_png() {
        let png = png_bytes(4, 2);
        assert_eq!(image::guess_format(&png).unwrap(), ImageFormat::Png);
    }

    #[test]
    fn log_capture_collects_warnings() {
        let logs = LogCapture::warnings();
        tracing::info!("not captured");
        tracing::warn!(key = "a", "captured");

        let contents = logs.contents();
        assert!(contents.contains("captured"));
        assert!(contents.contains("key=\"a\""));
        assert!(!contents.contains("not captured"));
    }

    #[tokio::test]
    async fn harness_seeds_records() {
        let storage = TestStorage::new();
        storage.seed_file(&test_file("1", "a.txt").build()).await;
        storage.seed_blob("flamelink/media/1_a.txt", b"a").await;

        let file = storage.service().get_file("1").await.unwrap();
        assert_eq!(file.unwrap().file, "1_a.txt");
        assert_eq!(storage.blob_keys(), ["flamelink/media/1_a.txt"]);
    }
}
