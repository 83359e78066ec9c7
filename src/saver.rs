//! Clip persistence -- the existing-asset check and the single download task
//!
//! [`clip_exists`] is the sole idempotency mechanism: a re-run after a crash
//! never re-fetches clips that were already fully persisted. [`save_clip`]
//! streams one remote object to its local destination; there is no
//! partial-file cleanup on failure, so a clip interrupted mid-write is
//! overwritten only on the next run's download attempt for a key whose file
//! is absent.

use futures::StreamExt;
use std::path::Path;
use std::time::Duration;
use tokio::io::AsyncWriteExt;

use crate::error::{Error, Result};
use crate::storage::ClipStorage;

/// Whether a clip has already been materialized at `path`.
///
/// Pure predicate: true only for an existing regular file.
pub async fn clip_exists(path: &Path) -> bool {
    tokio::fs::metadata(path)
        .await
        .map(|m| m.is_file())
        .unwrap_or(false)
}

/// Download one clip from `storage` at `key` into `dest`.
///
/// Creates the parent directory as needed, streams the object body to disk,
/// and returns the number of bytes written. When `timeout` is set it bounds
/// the whole transfer; an expired timeout maps to [`Error::Storage`] so the
/// pipeline treats it like any other failed download (logged and skipped).
pub async fn save_clip(
    storage: &dyn ClipStorage,
    key: &str,
    dest: &Path,
    timeout: Option<Duration>,
) -> Result<u64> {
    match timeout {
        Some(limit) => tokio::time::timeout(limit, copy_object(storage, key, dest))
            .await
            .map_err(|_| Error::Storage {
                key: key.to_string(),
                reason: format!("download timed out after {}s", limit.as_secs()),
            })?,
        None => copy_object(storage, key, dest).await,
    }
}

async fn copy_object(storage: &dyn ClipStorage, key: &str, dest: &Path) -> Result<u64> {
    if let Some(parent) = dest.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }

    let mut stream = storage.get_object(key).await?;
    let mut file = tokio::fs::File::create(dest).await?;

    let mut written = 0u64;
    while let Some(chunk) = stream.next().await {
        let chunk = chunk?;
        file.write_all(&chunk).await?;
        written += chunk.len() as u64;
    }
    file.flush().await?;

    tracing::debug!(key, dest = %dest.display(), bytes = written, "clip saved");
    Ok(written)
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use std::path::PathBuf;

    struct StaticStorage {
        body: &'static [u8],
    }

    #[async_trait::async_trait]
    impl ClipStorage for StaticStorage {
        async fn get_object(&self, _key: &str) -> Result<crate::storage::ByteStream> {
            let body = Bytes::from_static(self.body);
            Ok(Box::pin(futures::stream::once(async move {
                Ok::<_, Error>(body)
            })))
        }

        async fn put_object(&self, _key: &str, _source: &Path) -> Result<u64> {
            Ok(0)
        }
    }

    struct StalledStorage;

    #[async_trait::async_trait]
    impl ClipStorage for StalledStorage {
        async fn get_object(&self, _key: &str) -> Result<crate::storage::ByteStream> {
            Ok(Box::pin(futures::stream::once(async {
                futures::future::pending::<()>().await;
                Ok::<_, Error>(Bytes::new())
            })))
        }

        async fn put_object(&self, _key: &str, _source: &Path) -> Result<u64> {
            Ok(0)
        }
    }

    #[tokio::test]
    async fn test_clip_exists_only_for_regular_files() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("clip.mp3");

        assert!(!clip_exists(&file).await, "missing file must not exist");
        assert!(
            !clip_exists(dir.path()).await,
            "a directory must not satisfy the existing-asset check"
        );

        tokio::fs::write(&file, b"audio").await.unwrap();
        assert!(clip_exists(&file).await);
    }

    #[tokio::test]
    async fn test_save_clip_creates_parents_and_writes_body() {
        let dir = tempfile::tempdir().unwrap();
        let dest: PathBuf = dir.path().join("en/clips/common_voice_en_1.mp3");
        let storage = StaticStorage { body: b"ID3 clip" };

        let written = save_clip(&storage, "a.mp3", &dest, None).await.unwrap();

        assert_eq!(written, 8);
        assert_eq!(tokio::fs::read(&dest).await.unwrap(), b"ID3 clip");
    }

    #[tokio::test]
    async fn test_save_clip_times_out_as_storage_error() {
        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("clip.mp3");

        let err = save_clip(
            &StalledStorage,
            "stalled.mp3",
            &dest,
            Some(Duration::from_millis(50)),
        )
        .await
        .unwrap_err();

        assert!(
            matches!(err, Error::Storage { ref key, .. } if key == "stalled.mp3"),
            "expected storage timeout error, got: {err}"
        );
    }
}
