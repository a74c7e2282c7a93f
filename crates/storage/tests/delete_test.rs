#![allow(clippy::unwrap_used, clippy::expect_used)]
//! Deletion cascade tests.

mod common;

use common::*;
use flamelink_storage::{ExecutionContext, SizeSpec, StorageError, UploadOptions};

async fn seeded_with_blobs(storage: &TestStorage, sizes: Vec<SizeSpec>) {
    let file = test_file("1", "cat.png").image().with_sizes(sizes).build();
    storage.seed_blob(&original(&file.file), b"original").await;
    for size in file.variants().iter().filter(|s| s.is_addressable()) {
        storage.seed_blob(&variant(&file.file, size), b"variant").await;
    }
    storage.seed_file(&file).await;
}

#[tokio::test]
async fn test_delete_missing_record() {
    let storage = storage();
    let deleted = storage.service().delete_file("404").await.unwrap();

    assert!(deleted.is_none());
    assert!(storage.blobs.delete_calls().is_empty());
}

#[tokio::test]
async fn test_delete_cascades_over_variants() {
    let storage = storage();
    seeded_with_blobs(
        &storage,
        vec![SizeSpec::width(240), SizeSpec::sized(800, 600, 0.8)],
    )
    .await;

    let deleted = storage.service().delete_file("1").await.unwrap().unwrap();

    assert_eq!(deleted.file.id, "1");
    assert_eq!(
        deleted.deleted_blobs,
        [
            "flamelink/media/1_cat.png",
            "flamelink/media/sized/240/1_cat.png",
            "flamelink/media/sized/800_600_80/1_cat.png",
        ]
    );
    assert!(storage.blob_keys().is_empty());
    assert!(storage.service().get_file("1").await.unwrap().is_none());
}

#[tokio::test]
async fn test_delete_skips_duplicate_and_unaddressable_sizes() {
    let storage = storage();
    seeded_with_blobs(
        &storage,
        vec![
            SizeSpec::width(240),
            SizeSpec::max_width(240),
            SizeSpec::default().with_height(10),
        ],
    )
    .await;

    let deleted = storage.service().delete_file("1").await.unwrap().unwrap();

    assert_eq!(deleted.deleted_blobs.len(), 2);
    assert_eq!(storage.blobs.delete_calls().len(), 2);
}

#[tokio::test]
async fn test_upload_then_delete_leaves_nothing() {
    let storage = storage().with_default_sizes(widths(&[100, 1080]));
    let service = storage.service();
    let uploaded = upload_cat(&service, UploadOptions::default()).await;
    assert_eq!(storage.blob_keys().len(), 4);

    let deleted = service.delete_file(&uploaded.file.id).await.unwrap().unwrap();

    assert_eq!(deleted.deleted_blobs.len(), 4);
    assert!(storage.blob_keys().is_empty());
    assert_eq!(storage.documents.inner().count("fl_files"), 0);
}

#[tokio::test]
async fn test_variant_delete_failure_keeps_record() {
    let storage = storage();
    seeded_with_blobs(&storage, widths(&[240, 600])).await;
    storage.blobs.fail_deletes_containing("sized/600/");

    let err = storage.service().delete_file("1").await.unwrap_err();

    assert!(err.is_partial());
    assert_eq!(
        err.touched_blobs(),
        [
            "flamelink/media/1_cat.png",
            "flamelink/media/sized/240/1_cat.png",
        ]
    );
    assert!(storage.service().get_file("1").await.unwrap().is_some());
    assert::blob_exists(storage.blobs.inner(), "flamelink/media/sized/600/1_cat.png");
}

#[tokio::test]
async fn test_record_delete_failure_is_partial() {
    let storage = storage();
    seeded_with_blobs(&storage, widths(&[240])).await;
    storage.documents.fail_deletes();

    let err = storage.service().delete_file("1").await.unwrap_err();

    assert!(err.is_partial());
    assert_eq!(err.touched_blobs().len(), 2);
    assert!(storage.blob_keys().is_empty());
}

#[tokio::test]
async fn test_original_delete_failure_stops_early() {
    let storage = storage();
    seeded_with_blobs(&storage, widths(&[240])).await;
    storage.blobs.fail_deletes_containing("media/1_cat.png");

    let err = storage.service().delete_file("1").await.unwrap_err();

    assert!(matches!(err, StorageError::Backend(_)));
    assert_eq!(storage.blobs.delete_calls(), ["flamelink/media/1_cat.png"]);
    assert_eq!(storage.blob_keys().len(), 2);
}

#[tokio::test]
async fn test_delete_url_reference_has_no_variants() {
    let storage = storage();
    let legacy = url_of(&storage, "flamelink/media/legacy.png");
    storage.seed_blob("flamelink/media/legacy.png", b"old").await;
    storage
        .seed_file(
            &test_file("3", "legacy.png")
                .image()
                .with_file(legacy)
                .with_sizes(widths(&[240]))
                .build(),
        )
        .await;

    let deleted = storage.service().delete_file("3").await.unwrap().unwrap();

    assert_eq!(deleted.deleted_blobs, ["flamelink/media/legacy.png"]);
    assert_eq!(storage.blobs.delete_calls().len(), 1);
}

#[tokio::test]
async fn test_delete_capability_checks() {
    let storage = storage();
    seeded_with_blobs(&storage, widths(&[240])).await;

    for context in [ExecutionContext::server(), ExecutionContext::server_privileged()] {
        let result = storage.service_in(context).delete_file("1").await;
        assert!(matches!(result, Err(StorageError::UnsupportedOperation(_))));
    }
    let empty = storage.service().delete_file("").await;
    assert!(matches!(empty, Err(StorageError::MissingArgument { .. })));

    assert!(storage.blobs.delete_calls().is_empty());
}
