//! Object-storage abstraction for SitePress.
//!
//! The pipeline talks to containers of named blobs through the
//! [`ObjectStore`] trait. Two backends ship here:
//! - [`FsStore`] — containers as subdirectories of a local root; used by
//!   tests and local runs
//! - [`HttpStore`] — a REST storage-gateway client over `reqwest`
//!
//! **Access rules:** only the deployer mutates the hosting container during
//! normal operation, only rollback mutates it during recovery, and only
//! backup mutates the backup container. The trait itself enforces nothing;
//! sequential pipeline ordering does.

mod fs;
mod http;

pub use fs::FsStore;
pub use http::HttpStore;

use async_trait::async_trait;

use sitepress_shared::Result;

/// Metadata for one object in a container listing.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct ObjectMeta {
    /// Object key — a relative, `/`-separated name.
    pub key: String,
    /// Object size in bytes.
    pub size_bytes: u64,
}

/// A container-addressed object store.
///
/// All errors surface as [`sitepress_shared::SitePressError::Access`]; the
/// calling stage classifies them into per-file or fatal error records.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// List every object in `container`, in stable (sorted) key order.
    async fn list(&self, container: &str) -> Result<Vec<ObjectMeta>>;

    /// Fetch the content of one object.
    async fn get(&self, container: &str, key: &str) -> Result<Vec<u8>>;

    /// Write one object, overwriting any existing object at `key`.
    async fn put(&self, container: &str, key: &str, bytes: Vec<u8>, content_type: &str)
    -> Result<()>;

    /// Server-side copy of one object between containers (no local download).
    async fn copy(&self, src_container: &str, key: &str, dst_container: &str) -> Result<()>;

    /// Delete one object. Deleting a missing object is not an error.
    async fn delete(&self, container: &str, key: &str) -> Result<()>;
}
