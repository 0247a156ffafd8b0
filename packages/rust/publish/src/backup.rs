//! Backup and rollback: container-to-container mirrors via server-side copy.
//!
//! Backup runs before every deploy; rollback is only ever invoked by the
//! orchestrator after a catastrophic deploy failure. Both reuse
//! [`DeploymentResult`] — they are deploys between containers with the
//! direction reversed.

use std::collections::HashSet;
use std::time::Instant;

use tracing::{info, instrument, warn};

use sitepress_shared::{DeploymentResult, ErrorKind, StageError};
use sitepress_storage::ObjectStore;

/// Mirror the live site into the backup container before deploying.
///
/// Overwrites the previous backup; objects left over from an older, larger
/// backup are deleted so the backup container holds exactly the pre-deploy
/// hosting set. All failures are recorded as non-fatal errors — a failed
/// backup must never prevent a publish, it only disables rollback.
#[instrument(skip_all, fields(source = source_container, backup = backup_container))]
pub async fn backup_current_site(
    store: &dyn ObjectStore,
    source_container: &str,
    backup_container: &str,
) -> DeploymentResult {
    let start = Instant::now();
    let mut result = DeploymentResult::default();

    let source = match store.list(source_container).await {
        Ok(listing) => listing,
        Err(e) => {
            result.errors.push(StageError::new(
                ErrorKind::UploadFailure,
                format!("backup listing failed: {e}"),
            ));
            result.duration = start.elapsed();
            return result;
        }
    };

    // Drop stale objects so the backup is an exact mirror.
    let source_keys: HashSet<&str> = source.iter().map(|m| m.key.as_str()).collect();
    if let Ok(existing) = store.list(backup_container).await {
        for meta in existing {
            if !source_keys.contains(meta.key.as_str()) {
                if let Err(e) = store.delete(backup_container, &meta.key).await {
                    warn!(key = %meta.key, error = %e, "failed to prune stale backup object");
                }
            }
        }
    }

    for meta in &source {
        match store
            .copy(source_container, &meta.key, backup_container)
            .await
        {
            Ok(()) => result.files_uploaded += 1,
            Err(e) => {
                result.errors.push(StageError::new(
                    ErrorKind::UploadFailure,
                    format!("backup copy failed: {}: {e}", meta.key),
                ));
            }
        }
    }

    result.duration = start.elapsed();
    info!(
        backed_up = result.files_uploaded,
        errors = result.errors.len(),
        "backup complete"
    );
    result
}

/// Restore the backup into the hosting container.
///
/// Deletes the target's contents first, then copies every backup object
/// back. The delete-then-restore order means a mid-failure leaves the site
/// empty only transiently, never serving a half-new/half-old mix for long.
#[instrument(skip_all, fields(backup = backup_container, target = target_container))]
pub async fn rollback_deployment(
    store: &dyn ObjectStore,
    backup_container: &str,
    target_container: &str,
) -> DeploymentResult {
    let start = Instant::now();
    let mut result = DeploymentResult::default();

    let backup = match store.list(backup_container).await {
        Ok(listing) => listing,
        Err(e) => {
            result.errors.push(StageError::new(
                ErrorKind::UploadFailure,
                format!("rollback listing failed: {e}"),
            ));
            result.duration = start.elapsed();
            return result;
        }
    };

    if let Ok(existing) = store.list(target_container).await {
        for meta in existing {
            if let Err(e) = store.delete(target_container, &meta.key).await {
                warn!(key = %meta.key, error = %e, "failed to clear target object");
                result.errors.push(StageError::new(
                    ErrorKind::UploadFailure,
                    format!("rollback clear failed: {}: {e}", meta.key),
                ));
            }
        }
    }

    for meta in &backup {
        match store
            .copy(backup_container, &meta.key, target_container)
            .await
        {
            Ok(()) => result.files_uploaded += 1,
            Err(e) => {
                result.errors.push(StageError::new(
                    ErrorKind::UploadFailure,
                    format!("rollback copy failed: {}: {e}", meta.key),
                ));
            }
        }
    }

    result.duration = start.elapsed();
    info!(
        restored = result.files_uploaded,
        errors = result.errors.len(),
        "rollback complete"
    );
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use sitepress_storage::FsStore;

    async fn seeded(container: &str, keys: &[&str]) -> (tempfile::TempDir, FsStore) {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = FsStore::new(dir.path()).expect("store");
        for key in keys {
            store
                .put(container, key, format!("content of {key}").into_bytes(), "text/html")
                .await
                .expect("seed");
        }
        (dir, store)
    }

    #[tokio::test]
    async fn backup_mirrors_hosting_container() {
        let (_dir, store) = seeded("web", &["index.html", "css/site.css"]).await;

        let result = backup_current_site(&store, "web", "web-backup").await;

        assert_eq!(result.files_uploaded, 2);
        assert!(result.errors.is_empty());
        let backed = store.list("web-backup").await.expect("list");
        assert_eq!(backed.len(), 2);
    }

    #[tokio::test]
    async fn backup_prunes_stale_objects() {
        let (_dir, store) = seeded("web", &["index.html"]).await;
        store
            .put("web-backup", "old-page.html", b"stale".to_vec(), "text/html")
            .await
            .expect("seed stale");

        backup_current_site(&store, "web", "web-backup").await;

        let keys: Vec<_> = store
            .list("web-backup")
            .await
            .expect("list")
            .into_iter()
            .map(|m| m.key)
            .collect();
        assert_eq!(keys, vec!["index.html"]);
    }

    #[tokio::test]
    async fn backup_of_unreachable_source_reports_nonfatal_error() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = FsStore::new(dir.path()).expect("store");

        let result = backup_current_site(&store, "web", "web-backup").await;

        assert_eq!(result.files_uploaded, 0);
        assert_eq!(result.errors.len(), 1);
        assert_eq!(result.errors[0].kind, ErrorKind::UploadFailure);
    }

    #[tokio::test]
    async fn rollback_restores_backed_up_objects() {
        let (_dir, store) = seeded("web", &["index.html", "about.html"]).await;
        backup_current_site(&store, "web", "web-backup").await;

        // Simulate a broken deploy: hosting now holds garbage.
        store.delete("web", "about.html").await.expect("delete");
        store
            .put("web", "broken.html", b"half-deployed".to_vec(), "text/html")
            .await
            .expect("put");

        let result = rollback_deployment(&store, "web-backup", "web").await;

        assert_eq!(result.files_uploaded, 2);
        let keys: Vec<_> = store
            .list("web")
            .await
            .expect("list")
            .into_iter()
            .map(|m| m.key)
            .collect();
        assert_eq!(keys, vec!["about.html", "index.html"]);
    }

    #[tokio::test]
    async fn backup_then_rollback_is_identity() {
        let (_dir, store) = seeded("web", &["a.html", "b.html", "c/d.html"]).await;
        let before = store.list("web").await.expect("list");

        backup_current_site(&store, "web", "web-backup").await;
        rollback_deployment(&store, "web-backup", "web").await;

        let after = store.list("web").await.expect("list");
        assert_eq!(before, after);
    }
}
