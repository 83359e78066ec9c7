//! Integration tests for the HTTP object storage implementation.

use std::time::Duration;

use corpus_bundler::{Error, HttpClipStorage, save_clip};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

#[tokio::test]
async fn test_save_clip_streams_object_to_disk() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/voice-clips/abc/1.mp3"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(b"ID3 fake audio".to_vec()))
        .expect(1)
        .mount(&server)
        .await;

    let storage = HttpClipStorage::new(&format!("{}/voice-clips", server.uri())).unwrap();
    let dir = tempfile::tempdir().unwrap();
    let dest = dir.path().join("en/clips/common_voice_en_1.mp3");

    let written = save_clip(&storage, "abc/1.mp3", &dest, None).await.unwrap();

    assert_eq!(written, 14);
    assert_eq!(std::fs::read(&dest).unwrap(), b"ID3 fake audio");
}

#[tokio::test]
async fn test_missing_object_is_storage_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let storage = HttpClipStorage::new(&server.uri()).unwrap();
    let dir = tempfile::tempdir().unwrap();

    let err = save_clip(&storage, "gone.mp3", &dir.path().join("gone.mp3"), None)
        .await
        .unwrap_err();

    assert!(
        matches!(err, Error::Storage { ref key, ref reason } if key == "gone.mp3" && reason.contains("404")),
        "expected 404 storage error, got: {err}"
    );
}

#[tokio::test]
async fn test_slow_object_times_out() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_bytes(b"slow".to_vec())
                .set_delay(Duration::from_secs(5)),
        )
        .mount(&server)
        .await;

    let storage = HttpClipStorage::new(&server.uri()).unwrap();
    let dir = tempfile::tempdir().unwrap();

    let err = save_clip(
        &storage,
        "slow.mp3",
        &dir.path().join("slow.mp3"),
        Some(Duration::from_millis(100)),
    )
    .await
    .unwrap_err();

    assert!(
        matches!(err, Error::Storage { ref reason, .. } if reason.contains("timed out")),
        "expected timeout error, got: {err}"
    );
}

#[tokio::test]
async fn test_put_object_uploads_file_and_returns_length() {
    use corpus_bundler::ClipStorage;

    let server = MockServer::start().await;
    Mock::given(method("PUT"))
        .and(path("/bundles/cv-corpus-1/en.zip"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let archive = dir.path().join("en.zip");
    std::fs::write(&archive, b"PK archive bytes").unwrap();

    let storage = HttpClipStorage::new(&format!("{}/bundles", server.uri())).unwrap();
    let uploaded = storage
        .put_object("cv-corpus-1/en.zip", &archive)
        .await
        .unwrap();

    assert_eq!(uploaded, 16);
}
