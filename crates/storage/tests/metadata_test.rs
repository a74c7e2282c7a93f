#![allow(clippy::unwrap_used, clippy::expect_used)]
//! Blob metadata read and update tests.

mod common;

use common::*;
use flamelink_storage::models::FILE_ID_METADATA_KEY;
use flamelink_storage::{
    ExecutionContext, MetadataUpdate, StorageError, UpdateMetadataOptions, UploadOptions,
};

#[tokio::test]
async fn test_get_metadata_of_upload() {
    let storage = storage();
    let service = storage.service();
    let uploaded = upload_cat(&service, UploadOptions::default()).await;

    let metadata = service.get_metadata(&uploaded.file.id).await.unwrap().unwrap();

    assert_eq!(metadata.full_path, original(&uploaded.file.file));
    assert_eq!(metadata.name, uploaded.file.file);
    assert_eq!(metadata.content_type.as_deref(), Some("image/png"));
    assert_eq!(
        metadata.custom_metadata.get(FILE_ID_METADATA_KEY),
        Some(&uploaded.file.id)
    );
}

#[tokio::test]
async fn test_update_metadata() {
    let storage = storage();
    let service = storage.service();
    let uploaded = upload_cat(&service, UploadOptions::default()).await;

    let updated = service
        .update_metadata(&UpdateMetadataOptions {
            file_id: uploaded.file.id.clone(),
            updates: MetadataUpdate::default()
                .cache_control("public, max-age=60")
                .custom("alt", "A cat")
                .remove_custom(FILE_ID_METADATA_KEY),
        })
        .await
        .unwrap()
        .unwrap();

    assert_eq!(updated.cache_control.as_deref(), Some("public, max-age=60"));
    assert_eq!(updated.custom_metadata.get("alt"), Some(&"A cat".to_string()));
    assert!(!updated.custom_metadata.contains_key(FILE_ID_METADATA_KEY));

    let reread = service.get_metadata(&uploaded.file.id).await.unwrap().unwrap();
    assert_eq!(reread, updated);
}

#[tokio::test]
async fn test_metadata_of_missing_record() {
    let storage = storage();
    let service = storage.service();

    assert!(service.get_metadata("404").await.unwrap().is_none());
    let updated = service
        .update_metadata(&UpdateMetadataOptions {
            file_id: "404".to_string(),
            updates: MetadataUpdate::default().content_type("text/plain"),
        })
        .await
        .unwrap();
    assert!(updated.is_none());
}

#[tokio::test]
async fn test_update_metadata_requires_arguments() {
    let storage = storage();
    let service = storage.service();

    let empty_update = service
        .update_metadata(&UpdateMetadataOptions {
            file_id: "1".to_string(),
            updates: MetadataUpdate::default(),
        })
        .await
        .unwrap_err();
    assert::contains(&empty_update.to_string(), "\"fileID\" and the \"updates\" object");

    let no_id = service
        .update_metadata(&UpdateMetadataOptions {
            file_id: String::new(),
            updates: MetadataUpdate::default().content_type("text/plain"),
        })
        .await;
    assert!(matches!(no_id, Err(StorageError::MissingArgument { .. })));
}

#[tokio::test]
async fn test_metadata_blocked_for_unprivileged_server() {
    let storage = storage();
    storage.seed_file(&test_file("1", "a.txt").build()).await;
    storage.seed_blob("flamelink/media/1_a.txt", b"a").await;

    let result = storage
        .service_in(ExecutionContext::server())
        .get_metadata("1")
        .await;
    assert!(matches!(result, Err(StorageError::UnsupportedOperation(_))));

    let privileged = storage
        .service_in(ExecutionContext::server_privileged())
        .get_metadata("1")
        .await
        .unwrap();
    assert!(privileged.is_some());
}
