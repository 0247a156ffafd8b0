//! Local-filesystem object store.
//!
//! Containers are subdirectories of a root directory; object keys map to
//! relative file paths. Server-side copy is a local file copy.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tracing::debug;

use sitepress_shared::{Result, SitePressError};

use crate::{ObjectMeta, ObjectStore};

/// Object store backed by a local directory tree.
#[derive(Debug, Clone)]
pub struct FsStore {
    root: PathBuf,
}

impl FsStore {
    /// Create a store rooted at `root`. The directory is created if absent.
    pub fn new(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        std::fs::create_dir_all(&root).map_err(|e| SitePressError::io(&root, e))?;
        Ok(Self { root })
    }

    fn container_dir(&self, container: &str) -> PathBuf {
        self.root.join(container)
    }

    fn object_path(&self, container: &str, key: &str) -> PathBuf {
        self.container_dir(container).join(key)
    }

    /// Recursively collect object keys under `dir`, relative to `base`.
    fn collect_keys(base: &Path, dir: &Path, out: &mut Vec<ObjectMeta>) -> Result<()> {
        let entries = std::fs::read_dir(dir).map_err(|e| SitePressError::io(dir, e))?;
        for entry in entries {
            let entry = entry.map_err(|e| SitePressError::io(dir, e))?;
            let path = entry.path();
            if path.is_dir() {
                Self::collect_keys(base, &path, out)?;
            } else {
                let meta = entry
                    .metadata()
                    .map_err(|e| SitePressError::io(&path, e))?;
                let rel = path
                    .strip_prefix(base)
                    .map_err(|_| SitePressError::Access("listing escaped container".into()))?;
                let key = rel
                    .components()
                    .map(|c| c.as_os_str().to_string_lossy())
                    .collect::<Vec<_>>()
                    .join("/");
                out.push(ObjectMeta {
                    key,
                    size_bytes: meta.len(),
                });
            }
        }
        Ok(())
    }
}

#[async_trait]
impl ObjectStore for FsStore {
    async fn list(&self, container: &str) -> Result<Vec<ObjectMeta>> {
        let dir = self.container_dir(container);
        if !dir.is_dir() {
            return Err(SitePressError::Access(format!(
                "container not found: {container}"
            )));
        }
        let mut out = Vec::new();
        Self::collect_keys(&dir, &dir, &mut out)?;
        out.sort_by(|a, b| a.key.cmp(&b.key));
        debug!(container, objects = out.len(), "listed container");
        Ok(out)
    }

    async fn get(&self, container: &str, key: &str) -> Result<Vec<u8>> {
        let path = self.object_path(container, key);
        std::fs::read(&path).map_err(|e| SitePressError::io(&path, e))
    }

    async fn put(
        &self,
        container: &str,
        key: &str,
        bytes: Vec<u8>,
        _content_type: &str,
    ) -> Result<()> {
        let path = self.object_path(container, key);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| SitePressError::io(parent, e))?;
        }
        std::fs::write(&path, bytes).map_err(|e| SitePressError::io(&path, e))
    }

    async fn copy(&self, src_container: &str, key: &str, dst_container: &str) -> Result<()> {
        let src = self.object_path(src_container, key);
        let dst = self.object_path(dst_container, key);
        if let Some(parent) = dst.parent() {
            std::fs::create_dir_all(parent).map_err(|e| SitePressError::io(parent, e))?;
        }
        std::fs::copy(&src, &dst).map_err(|e| SitePressError::io(&src, e))?;
        Ok(())
    }

    async fn delete(&self, container: &str, key: &str) -> Result<()> {
        let path = self.object_path(container, key);
        match std::fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(SitePressError::io(&path, e)),
        }
    }
}
