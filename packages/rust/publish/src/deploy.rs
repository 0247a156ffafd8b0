//! Deployer: upload a generated site tree to the hosting container.
//!
//! Per-file failures are collected and never abort the sweep. The
//! catastrophic signal the orchestrator watches for is `files_uploaded == 0`
//! despite having build output to upload.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use tokio::sync::Semaphore;
use tracing::{info, instrument, warn};

use sitepress_shared::{DeploymentResult, ErrorKind, StageError};
use sitepress_storage::ObjectStore;
use sitepress_validate::{validate_blob_name, validate_path};

use crate::content_type::content_type_for;

/// Upload every file under `local_dir` into `destination_container`.
///
/// Object keys are the `/`-separated paths relative to `local_dir`; each is
/// validated before upload and tagged with a content type from the static
/// extension table.
#[instrument(skip_all, fields(container = destination_container, concurrency))]
pub async fn deploy_directory(
    store: Arc<dyn ObjectStore>,
    local_dir: &Path,
    destination_container: &str,
    concurrency: usize,
) -> DeploymentResult {
    let start = Instant::now();
    let mut result = DeploymentResult::default();

    let mut files = Vec::new();
    if let Err(e) = collect_files(local_dir, local_dir, &mut files) {
        result.errors.push(StageError::new(
            ErrorKind::UploadFailure,
            format!("could not read output tree: {e}"),
        ));
        result.duration = start.elapsed();
        return result;
    }

    let semaphore = Arc::new(Semaphore::new(concurrency.max(1)));
    let mut handles = Vec::with_capacity(files.len());

    for relative in files {
        let key = to_key(&relative);

        if !validate_blob_name(&key) || !validate_path(&relative, local_dir) {
            warn!(key = %key, "upload path rejected by validation");
            result.errors.push(StageError::new(
                ErrorKind::ValidationFailure,
                format!("invalid upload path: {key}"),
            ));
            continue;
        }

        let store = store.clone();
        let sem = semaphore.clone();
        let container = destination_container.to_string();
        let source = local_dir.join(&relative);

        handles.push(tokio::spawn(async move {
            let _permit = sem.acquire().await.expect("semaphore closed");
            upload_one(store.as_ref(), &container, &key, &source).await
        }));
    }

    for handle in handles {
        match handle.await {
            Ok(Ok(())) => result.files_uploaded += 1,
            Ok(Err(stage_err)) => result.errors.push(stage_err),
            Err(e) => result.errors.push(StageError::new(
                ErrorKind::UploadFailure,
                format!("upload task panicked: {e}"),
            )),
        }
    }

    result.duration = start.elapsed();
    info!(
        uploaded = result.files_uploaded,
        errors = result.errors.len(),
        duration_ms = result.duration.as_millis(),
        "deploy sweep complete"
    );
    result
}

/// Upload one file with its extension-derived content type.
async fn upload_one(
    store: &dyn ObjectStore,
    container: &str,
    key: &str,
    source: &Path,
) -> std::result::Result<(), StageError> {
    let bytes = std::fs::read(source).map_err(|e| {
        StageError::new(ErrorKind::UploadFailure, format!("read failed: {key}: {e}"))
    })?;

    let content_type = content_type_for(Path::new(key));

    store
        .put(container, key, bytes, content_type)
        .await
        .map_err(|e| {
            StageError::new(ErrorKind::UploadFailure, format!("upload failed: {key}: {e}"))
        })
}

/// Render a relative path as a `/`-separated object key.
fn to_key(relative: &Path) -> String {
    relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

/// Recursively collect file paths under `dir`, relative to `base`.
fn collect_files(base: &Path, dir: &Path, out: &mut Vec<PathBuf>) -> std::io::Result<()> {
    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        let path = entry.path();
        if path.is_dir() {
            collect_files(base, &path, out)?;
        } else if let Ok(rel) = path.strip_prefix(base) {
            out.push(rel.to_path_buf());
        }
    }
    out.sort();
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use sitepress_storage::FsStore;

    fn site(files: &[(&str, &str)]) -> tempfile::TempDir {
        let dir = tempfile::tempdir().expect("tempdir");
        for (path, content) in files {
            let full = dir.path().join(path);
            std::fs::create_dir_all(full.parent().expect("parent")).expect("mkdir");
            std::fs::write(full, content).expect("write");
        }
        dir
    }

    #[tokio::test]
    async fn uploads_tree_with_content_types() {
        let local = site(&[
            ("index.html", "<html></html>"),
            ("css/site.css", "body{}"),
            ("img/logo.bin", "\u{0}\u{1}"),
        ]);
        let storage_root = tempfile::tempdir().expect("tempdir");
        let store = Arc::new(FsStore::new(storage_root.path()).expect("store"));

        let result = deploy_directory(store.clone(), local.path(), "web", 4).await;

        assert_eq!(result.files_uploaded, 3);
        assert!(result.errors.is_empty());

        let listed = store.list("web").await.expect("list");
        let keys: Vec<_> = listed.iter().map(|m| m.key.as_str()).collect();
        assert_eq!(keys, vec!["css/site.css", "img/logo.bin", "index.html"]);
    }

    #[tokio::test]
    async fn missing_output_tree_yields_zero_uploads() {
        let storage_root = tempfile::tempdir().expect("tempdir");
        let store = Arc::new(FsStore::new(storage_root.path()).expect("store"));

        let result =
            deploy_directory(store, Path::new("/nonexistent/site"), "web", 4).await;

        assert_eq!(result.files_uploaded, 0);
        assert_eq!(result.errors.len(), 1);
        assert_eq!(result.errors[0].kind, ErrorKind::UploadFailure);
    }

    #[tokio::test]
    async fn redeploy_is_overwrite_based() {
        let local = site(&[("index.html", "v1")]);
        let storage_root = tempfile::tempdir().expect("tempdir");
        let store = Arc::new(FsStore::new(storage_root.path()).expect("store"));

        deploy_directory(store.clone(), local.path(), "web", 2).await;
        std::fs::write(local.path().join("index.html"), "v2").expect("rewrite");
        let second = deploy_directory(store.clone(), local.path(), "web", 2).await;

        assert_eq!(second.files_uploaded, 1);
        let bytes = store.get("web", "index.html").await.expect("get");
        assert_eq!(bytes, b"v2");
        assert_eq!(store.list("web").await.expect("list").len(), 1);
    }
}
