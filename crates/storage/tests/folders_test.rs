#![allow(clippy::unwrap_used, clippy::expect_used)]
//! Folder resolution and file listing tests.

mod common;

use common::*;
use flamelink_storage::{
    Folder, FolderKey, FolderLookup, GetFilesOptions, MediaType, StorageError,
};

async fn seeded() -> TestStorage {
    let storage = storage();
    storage.seed_folder(&test_folder("10", "Photos")).await;
    storage.seed_folder(&child_folder("11", "Cats", "10")).await;
    storage
        .seed_folder(&Folder {
            id: FolderKey::Number(12),
            name: "Legacy".to_string(),
            parent_id: None,
        })
        .await;

    storage
        .seed_file(&test_file("1", "cat.png").image().in_folder("11").build())
        .await;
    storage
        .seed_file(&test_file("2", "doc.pdf").in_folder("11").build())
        .await;
    storage
        .seed_file(&test_file("3", "old.png").image().in_folder(12_i64).build())
        .await;
    storage.seed_file(&test_file("4", "loose.txt").build()).await;
    storage
}

fn ids(files: &[flamelink_storage::File]) -> Vec<&str> {
    files.iter().map(|f| f.id.as_str()).collect()
}

#[tokio::test]
async fn test_explicit_id_returned_unchanged() {
    let storage = seeded().await;
    let service = storage.service();

    let reads = storage.documents.reads();
    let id = service
        .resolve_folder_id(&FolderLookup::id(99_i64))
        .await
        .unwrap();
    assert_eq!(id, Some(FolderKey::Number(99)));
    let id = service
        .resolve_folder_id(&FolderLookup {
            folder_id: Some(FolderKey::from("abc")),
            folder_name: Some("Cats".to_string()),
        })
        .await
        .unwrap();
    assert_eq!(id, Some(FolderKey::from("abc")));
    // No lookup for an explicit id.
    assert_eq!(storage.documents.reads(), reads);
}

#[tokio::test]
async fn test_name_resolution() {
    let storage = seeded().await;
    let service = storage.service();

    assert_eq!(
        service
            .resolve_folder_id(&FolderLookup::name("Cats"))
            .await
            .unwrap(),
        Some(FolderKey::from("11"))
    );
    assert_eq!(
        service
            .resolve_folder_id(&FolderLookup::name("Missing"))
            .await
            .unwrap(),
        None
    );
    assert_eq!(
        service
            .resolve_folder_id(&FolderLookup::default())
            .await
            .unwrap(),
        None
    );
}

#[tokio::test]
async fn test_folder_lookup_failure_propagates() {
    let storage = seeded().await;
    storage.documents.fail_reads();

    let err = storage
        .service()
        .resolve_folder_id(&FolderLookup::name("Cats"))
        .await
        .unwrap_err();
    assert!(matches!(err, StorageError::Backend(_)));
}

#[tokio::test]
async fn test_folder_tree() {
    let storage = seeded().await;
    let tree = storage.service().get_folder_tree().await.unwrap();

    assert_eq!(tree.len(), 2);
    let photos = tree
        .iter()
        .find(|node| node.folder.name == "Photos")
        .unwrap();
    assert_eq!(photos.children.len(), 1);
    assert_eq!(photos.children[0].folder.name, "Cats");
}

#[tokio::test]
async fn test_malformed_folder_skipped() {
    use flamelink_storage::document::DocumentStore;

    let storage = seeded().await;
    storage
        .documents
        .inner()
        .set("fl_folders", "bad", serde_json::json!({"title": 1}))
        .await
        .unwrap();

    assert_eq!(storage.service().get_folders().await.unwrap().len(), 3);
}

#[tokio::test]
async fn test_get_files_filters() {
    let storage = seeded().await;
    let service = storage.service();

    let all = service.get_files(&GetFilesOptions::default()).await.unwrap();
    assert_eq!(ids(&all), ["1", "2", "3", "4"]);

    let images = service
        .get_files(&GetFilesOptions::default().of_type(MediaType::Images))
        .await
        .unwrap();
    assert_eq!(ids(&images), ["1", "3"]);

    let cats = service
        .get_files(&GetFilesOptions::default().in_folder(FolderLookup::name("Cats")))
        .await
        .unwrap();
    assert_eq!(ids(&cats), ["1", "2"]);

    let cat_images = service
        .get_files(
            &GetFilesOptions::default()
                .in_folder(FolderLookup::id("11"))
                .of_type(MediaType::Images),
        )
        .await
        .unwrap();
    assert_eq!(ids(&cat_images), ["1"]);
}

#[tokio::test]
async fn test_get_files_folder_ids_are_strict() {
    let storage = seeded().await;
    let service = storage.service();

    let by_number = service
        .get_files(&GetFilesOptions::default().in_folder(FolderLookup::id(12_i64)))
        .await
        .unwrap();
    assert_eq!(ids(&by_number), ["3"]);

    let by_text = service
        .get_files(&GetFilesOptions::default().in_folder(FolderLookup::id("12")))
        .await
        .unwrap();
    assert!(by_text.is_empty());

    let unknown = service
        .get_files(&GetFilesOptions::default().in_folder(FolderLookup::name("Nope")))
        .await
        .unwrap();
    assert!(unknown.is_empty());
}

#[tokio::test]
async fn test_get_file() {
    let storage = seeded().await;
    let service = storage.service();

    assert_eq!(service.get_file("1").await.unwrap().unwrap().file, "1_cat.png");
    assert!(service.get_file("404").await.unwrap().is_none());
    assert!(matches!(
        service.get_file("").await,
        Err(StorageError::MissingArgument { .. })
    ));
}
