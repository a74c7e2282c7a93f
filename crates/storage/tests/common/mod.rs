#![allow(clippy::unwrap_used, clippy::expect_used)]
//! Shared helpers for storage integration tests.
//!
//! Everything runs against the in-memory stores wrapped by the fakes in
//! `flamelink-test-utils`, so failures can be injected per test.

#![allow(dead_code)]

pub use flamelink_test_utils::*;

use flamelink_storage::blob::BlobStore;
use flamelink_storage::paths::{original_key, variant_key};
use flamelink_storage::{FileData, SizeSpec, StorageService, UploadOptions, UploadResult};

/// A fresh harness with test logging enabled.
pub fn storage() -> TestStorage {
    init_tracing();
    TestStorage::new()
}

/// Upload a small PNG named `cat.png`.
pub async fn upload_cat(service: &StorageService, options: UploadOptions) -> UploadResult {
    service
        .upload(FileData::named("cat.png", png_bytes(8, 8)), options)
        .await
        .unwrap()
}

/// Key of a stored file's original.
pub fn original(filename: &str) -> String {
    original_key(filename)
}

/// Key of a stored file's variant.
pub fn variant(filename: &str, size: &SizeSpec) -> String {
    variant_key(filename, size).unwrap()
}

/// The public URL the harness blob store serves `key` from.
pub fn url_of(storage: &TestStorage, key: &str) -> String {
    storage.blobs.inner().download_url(key)
}
