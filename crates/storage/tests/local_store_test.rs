#![allow(clippy::unwrap_used, clippy::expect_used)]
//! End-to-end tests over the filesystem blob store and the real resizer.

mod common;

use std::sync::Arc;

use common::*;
use flamelink_storage::blob::UploadMetadata;
use flamelink_storage::{
    ExecutionContext, FileData, ImageCrateResizer, LocalBlobStore, MediaType, MemoryDocumentStore,
    SizeRequest, SizeSpec, StaticSettings, StorageService, UploadOptions, UrlOptions, UrlSigner,
};
use tempfile::TempDir;

fn local_service(dir: &TempDir) -> StorageService {
    init_tracing();
    StorageService::new(
        Arc::new(MemoryDocumentStore::new()),
        Arc::new(LocalBlobStore::new(dir.path(), "/files")),
        Arc::new(ImageCrateResizer::default()),
        Arc::new(StaticSettings::new(Some(vec![SizeSpec::max_width(100)]))),
    )
}

#[tokio::test]
async fn test_local_upload_resize_and_delete() {
    let dir = TempDir::new().unwrap();
    let service = local_service(&dir);

    let uploaded = service
        .upload(FileData::named("wide.png", png_bytes(600, 300)), UploadOptions::default())
        .await
        .unwrap();
    let filename = &uploaded.file.file;

    let original_path = dir.path().join("flamelink/media").join(filename);
    let baseline_path = dir.path().join("flamelink/media/sized/240").join(filename);
    let small_path = dir.path().join("flamelink/media/sized/100").join(filename);
    assert!(original_path.exists());

    let baseline = image::open(&baseline_path).unwrap();
    assert_eq!((baseline.width(), baseline.height()), (240, 120));
    let small = image::open(&small_path).unwrap();
    assert_eq!(small.width(), 100);

    let url = service
        .get_url(&UrlOptions::new(uploaded.file.id.clone()).with_size(SizeRequest::min_width(200)))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(url, format!("/files/flamelink/media/sized/240/{filename}"));

    service.delete_file(&uploaded.file.id).await.unwrap().unwrap();
    assert!(!original_path.exists());
    assert!(!baseline_path.exists());
    assert!(!small_path.exists());
}

#[tokio::test]
async fn test_small_images_are_not_upscaled() {
    let dir = TempDir::new().unwrap();
    let service = local_service(&dir);

    let uploaded = service
        .upload(FileData::named("tiny.png", png_bytes(50, 40)), UploadOptions::default())
        .await
        .unwrap();

    let baseline = image::open(
        dir.path()
            .join("flamelink/media/sized/240")
            .join(&uploaded.file.file),
    )
    .unwrap();
    assert_eq!((baseline.width(), baseline.height()), (50, 40));
}

#[tokio::test]
async fn test_path_sized_variants_without_width() {
    let dir = TempDir::new().unwrap();
    let service = local_service(&dir);

    let thumb = SizeSpec::default().with_path("thumb");
    let short = SizeSpec::default().with_path("short").with_height(100);
    let uploaded = service
        .upload(
            FileData::named("wide.png", png_bytes(600, 300)),
            UploadOptions::default().with_sizes(vec![thumb, short]),
        )
        .await
        .unwrap();
    let filename = &uploaded.file.file;

    let sized = dir.path().join("flamelink/media/sized");
    let thumb = image::open(sized.join("thumb").join(filename)).unwrap();
    assert_eq!((thumb.width(), thumb.height()), (600, 300));
    let short = image::open(sized.join("short").join(filename)).unwrap();
    assert_eq!((short.width(), short.height()), (200, 100));

    let stored = service.get_file(&uploaded.file.id).await.unwrap().unwrap();
    assert_eq!(stored.variants().len(), 4);
}

#[tokio::test]
async fn test_undecodable_image_stored_as_variants() {
    let dir = TempDir::new().unwrap();
    let service = local_service(&dir);
    let svg = br#"<svg xmlns="http://www.w3.org/2000/svg" width="10" height="10"/>"#.to_vec();

    let uploaded = service
        .upload(
            FileData::named("logo.svg", svg.clone()),
            UploadOptions::default()
                .with_metadata(UploadMetadata::default().with_content_type("image/svg+xml")),
        )
        .await
        .unwrap();
    let filename = &uploaded.file.file;

    assert_eq!(uploaded.file.media_type, MediaType::Images);
    assert_eq!(
        uploaded.file.variants(),
        [SizeSpec::max_width(100), SizeSpec::width(240)]
    );
    for folder in ["100", "240"] {
        let path = dir.path().join("flamelink/media/sized").join(folder).join(filename);
        assert_eq!(std::fs::read(path).unwrap(), svg);
    }
    assert!(service.get_file(&uploaded.file.id).await.unwrap().is_some());
}

#[tokio::test]
async fn test_signed_local_url_verifies() {
    let dir = TempDir::new().unwrap();
    let signer = UrlSigner::new("test-secret");
    let documents = Arc::new(MemoryDocumentStore::new());
    let blobs = Arc::new(LocalBlobStore::new(dir.path(), "/files").with_signer(signer.clone()));
    let build = |context: ExecutionContext| {
        StorageService::new(
            documents.clone(),
            blobs.clone(),
            Arc::new(ImageCrateResizer::default()),
            Arc::new(StaticSettings::new(None)),
        )
        .with_context(context)
    };

    let uploaded = build(ExecutionContext::client())
        .upload(FileData::named("doc.txt", b"hello".to_vec()), UploadOptions::default())
        .await
        .unwrap();
    let key = format!("flamelink/media/{}", uploaded.file.file);

    let url = build(ExecutionContext::server_privileged())
        .get_url(&UrlOptions::new(uploaded.file.id.clone()))
        .await
        .unwrap()
        .unwrap();

    let (base, query) = url.split_once('?').unwrap();
    assert_eq!(base, format!("/files/{key}"));
    let params: Vec<(&str, &str)> = query
        .split('&')
        .filter_map(|pair| pair.split_once('='))
        .collect();
    assert_eq!(params[0], ("expires", "16725225600"));
    assert_eq!(params[1].0, "signature");
    assert!(signer.verify(&key, 16_725_225_600, params[1].1, chrono::Utc::now()));
}
