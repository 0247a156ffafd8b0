//! Content downloader: fetch markdown blobs into the staging area.
//!
//! One bad blob never fails the sweep — it is logged, recorded as an error,
//! and skipped. The only fatal outcome is the source container being
//! unreachable, which propagates to the orchestrator as an access error.

use std::path::Path;
use std::sync::Arc;

use sha2::{Digest, Sha256};
use tokio::sync::Semaphore;
use tracing::{info, instrument, warn};

use sitepress_shared::{
    DownloadResult, ErrorKind, Result, SitePressError, StageError, StagedFile,
};
use sitepress_storage::ObjectStore;
use sitepress_validate::{validate_blob_name, validate_path};

/// Caps applied to one download sweep.
#[derive(Debug, Clone, Copy)]
pub struct DownloadLimits {
    /// Hard cap on blobs enumerated from the source container.
    pub max_files: usize,
    /// Per-blob size cap in bytes.
    pub max_file_size_bytes: u64,
    /// Concurrent downloads.
    pub concurrency: usize,
}

/// Download every acceptable markdown blob from `source_container` into
/// `destination_dir`, preserving validated relative paths.
///
/// Fails only if the container cannot be listed at all; every per-blob
/// problem is collected in the returned result.
#[instrument(skip_all, fields(container = source_container, max_files = limits.max_files))]
pub async fn download_markdown_files(
    store: Arc<dyn ObjectStore>,
    source_container: &str,
    destination_dir: &Path,
    limits: DownloadLimits,
) -> Result<DownloadResult> {
    std::fs::create_dir_all(destination_dir)
        .map_err(|e| SitePressError::io(destination_dir, e))?;

    let listing = store.list(source_container).await?;
    let total_listed = listing.len();

    let mut result = DownloadResult::default();
    let mut accepted = Vec::new();

    // Enumeration is hard-capped; blobs past the cap are never examined.
    for meta in listing.into_iter().take(limits.max_files) {
        if !validate_blob_name(&meta.key) {
            warn!(blob = %meta.key, "blob name rejected by validation");
            result.errors.push(StageError::new(
                ErrorKind::ValidationFailure,
                format!("invalid blob name: {}", meta.key),
            ));
            continue;
        }

        if meta.size_bytes > limits.max_file_size_bytes {
            warn!(
                blob = %meta.key,
                size = meta.size_bytes,
                limit = limits.max_file_size_bytes,
                "blob exceeds size limit"
            );
            result.errors.push(StageError::new(
                ErrorKind::SizeLimitExceeded,
                format!(
                    "blob too large: {} ({} bytes > {} bytes)",
                    meta.key, meta.size_bytes, limits.max_file_size_bytes
                ),
            ));
            continue;
        }

        // Defense in depth: the name passed the allow-list, but the write
        // target must also resolve inside the staging root.
        if !validate_path(Path::new(&meta.key), destination_dir) {
            result.errors.push(StageError::new(
                ErrorKind::ValidationFailure,
                format!("blob path escapes staging root: {}", meta.key),
            ));
            continue;
        }

        accepted.push(meta);
    }

    // Fetch accepted blobs under a bounded worker pool, preserving listing
    // order in the aggregated result.
    let semaphore = Arc::new(Semaphore::new(limits.concurrency.max(1)));
    let mut handles = Vec::with_capacity(accepted.len());

    for meta in accepted {
        let store = store.clone();
        let sem = semaphore.clone();
        let container = source_container.to_string();
        let dest = destination_dir.to_path_buf();
        let cap = limits.max_file_size_bytes;

        handles.push(tokio::spawn(async move {
            let _permit = sem.acquire().await.expect("semaphore closed");
            fetch_one(store.as_ref(), &container, &meta.key, &dest, cap).await
        }));
    }

    for handle in handles {
        match handle.await {
            Ok(Ok(staged)) => {
                result.files.push(staged);
            }
            Ok(Err(stage_err)) => {
                result.errors.push(stage_err);
            }
            Err(e) => {
                result.errors.push(StageError::new(
                    ErrorKind::UploadFailure,
                    format!("download task panicked: {e}"),
                ));
            }
        }
    }

    result.files_downloaded = result.files.len();

    info!(
        listed = total_listed,
        downloaded = result.files_downloaded,
        errors = result.errors.len(),
        "download sweep complete"
    );

    Ok(result)
}

/// Fetch one blob into the staging area.
async fn fetch_one(
    store: &dyn ObjectStore,
    container: &str,
    key: &str,
    destination_dir: &Path,
    max_file_size_bytes: u64,
) -> std::result::Result<StagedFile, StageError> {
    let bytes = store.get(container, key).await.map_err(|e| {
        StageError::new(ErrorKind::UploadFailure, format!("fetch failed: {key}: {e}"))
    })?;

    // Listings can under-report; re-check the actual payload.
    if bytes.len() as u64 > max_file_size_bytes {
        return Err(StageError::new(
            ErrorKind::SizeLimitExceeded,
            format!(
                "blob too large after fetch: {key} ({} bytes > {max_file_size_bytes} bytes)",
                bytes.len()
            ),
        ));
    }

    let target = destination_dir.join(key);
    if let Some(parent) = target.parent() {
        std::fs::create_dir_all(parent).map_err(|e| {
            StageError::new(
                ErrorKind::UploadFailure,
                format!("staging write failed: {key}: {e}"),
            )
        })?;
    }

    let content_hash = {
        let mut hasher = Sha256::new();
        hasher.update(&bytes);
        format!("{:x}", hasher.finalize())
    };

    let size_bytes = bytes.len() as u64;
    std::fs::write(&target, bytes).map_err(|e| {
        StageError::new(
            ErrorKind::UploadFailure,
            format!("staging write failed: {key}: {e}"),
        )
    })?;

    Ok(StagedFile {
        relative_path: key.to_string(),
        size_bytes,
        content_hash,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use sitepress_storage::{FsStore, ObjectMeta};

    const LIMITS: DownloadLimits = DownloadLimits {
        max_files: 100,
        max_file_size_bytes: 1024,
        concurrency: 4,
    };

    async fn seeded_store(root: &Path, blobs: &[(&str, &[u8])]) -> Arc<dyn ObjectStore> {
        let store = FsStore::new(root).expect("store");
        for (key, content) in blobs {
            store
                .put("content", key, content.to_vec(), "text/markdown")
                .await
                .expect("seed");
        }
        Arc::new(store)
    }

    #[tokio::test]
    async fn downloads_valid_blobs_and_records_hashes() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = seeded_store(
            dir.path(),
            &[("index.md", b"# Home"), ("posts/a.md", b"# A")],
        )
        .await;
        let staging = dir.path().join("staging");

        let result = download_markdown_files(store, "content", &staging, LIMITS)
            .await
            .expect("download");

        assert_eq!(result.files_downloaded, 2);
        assert!(result.errors.is_empty());
        assert!(staging.join("posts/a.md").is_file());
        assert!(result.files.iter().all(|f| f.content_hash.len() == 64));
    }

    /// In-memory store that can hold hostile keys a real backend might list,
    /// plus keys that appear in listings but fail on fetch.
    struct HostileStore {
        objects: Vec<(String, Vec<u8>)>,
        unfetchable: Vec<String>,
    }

    #[async_trait::async_trait]
    impl ObjectStore for HostileStore {
        async fn list(&self, _container: &str) -> sitepress_shared::Result<Vec<ObjectMeta>> {
            Ok(self
                .objects
                .iter()
                .map(|(key, content)| ObjectMeta {
                    key: key.clone(),
                    size_bytes: content.len() as u64,
                })
                .chain(self.unfetchable.iter().map(|key| ObjectMeta {
                    key: key.clone(),
                    size_bytes: 1,
                }))
                .collect())
        }

        async fn get(&self, _container: &str, key: &str) -> sitepress_shared::Result<Vec<u8>> {
            self.objects
                .iter()
                .find(|(k, _)| k == key)
                .map(|(_, content)| content.clone())
                .ok_or_else(|| SitePressError::Access(format!("missing: {key}")))
        }

        async fn put(
            &self,
            _container: &str,
            _key: &str,
            _bytes: Vec<u8>,
            _content_type: &str,
        ) -> sitepress_shared::Result<()> {
            unimplemented!("read-only test store")
        }

        async fn copy(
            &self,
            _src: &str,
            _key: &str,
            _dst: &str,
        ) -> sitepress_shared::Result<()> {
            unimplemented!("read-only test store")
        }

        async fn delete(&self, _container: &str, _key: &str) -> sitepress_shared::Result<()> {
            unimplemented!("read-only test store")
        }
    }

    #[tokio::test]
    async fn traversal_name_is_rejected_but_sweep_continues() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = Arc::new(HostileStore {
            objects: vec![
                ("a.md".into(), b"1".to_vec()),
                ("b.md".into(), b"2".to_vec()),
                ("c.md".into(), b"3".to_vec()),
                ("../../etc/passwd".into(), b"root".to_vec()),
            ],
            unfetchable: vec![],
        });
        let staging = dir.path().join("staging");

        let result = download_markdown_files(store, "content", &staging, LIMITS)
            .await
            .expect("download");

        assert_eq!(result.files_downloaded, 3);
        assert_eq!(result.errors.len(), 1);
        assert_eq!(result.errors[0].kind, ErrorKind::ValidationFailure);
        assert!(!dir.path().join("etc/passwd").exists());
    }

    #[tokio::test]
    async fn fetch_failure_is_recorded_as_transfer_error() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = Arc::new(HostileStore {
            objects: vec![("ok.md".into(), b"# ok".to_vec())],
            unfetchable: vec!["gone.md".into()],
        });
        let staging = dir.path().join("staging");

        let result = download_markdown_files(store, "content", &staging, LIMITS)
            .await
            .expect("download");

        assert_eq!(result.files_downloaded, 1);
        assert_eq!(result.errors.len(), 1);
        assert_eq!(result.errors[0].kind, ErrorKind::UploadFailure);
        assert!(result.errors[0].message.contains("gone.md"));
    }

    #[tokio::test]
    async fn oversized_blob_is_skipped_with_error() {
        let dir = tempfile::tempdir().expect("tempdir");
        let big = vec![b'x'; 2048];
        let store = seeded_store(dir.path(), &[("small.md", b"ok"), ("big.md", &big)]).await;
        let staging = dir.path().join("staging");

        let result = download_markdown_files(store, "content", &staging, LIMITS)
            .await
            .expect("download");

        assert_eq!(result.files_downloaded, 1);
        assert_eq!(result.errors.len(), 1);
        assert_eq!(result.errors[0].kind, ErrorKind::SizeLimitExceeded);
        assert!(!staging.join("big.md").exists());
    }

    #[tokio::test]
    async fn enumeration_stops_at_max_files() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = seeded_store(
            dir.path(),
            &[("a.md", b"1"), ("b.md", b"2"), ("c.md", b"3"), ("d.md", b"4")],
        )
        .await;
        let staging = dir.path().join("staging");
        let limits = DownloadLimits {
            max_files: 2,
            ..LIMITS
        };

        let result = download_markdown_files(store, "content", &staging, limits)
            .await
            .expect("download");

        assert_eq!(result.files_downloaded, 2);
    }

    #[tokio::test]
    async fn unreachable_container_is_fatal() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store: Arc<dyn ObjectStore> = Arc::new(FsStore::new(dir.path()).expect("store"));
        let staging = dir.path().join("staging");

        let err = download_markdown_files(store, "missing", &staging, LIMITS)
            .await
            .unwrap_err();
        assert!(matches!(err, SitePressError::Access(_)));
    }
}
