//! REST storage-gateway client.
//!
//! Speaks the gateway's container/object convention:
//! - `GET    {base}/{container}?list`        → JSON array of object metadata
//! - `GET    {base}/{container}/{key}`       → object bytes
//! - `PUT    {base}/{container}/{key}`       → write object (`Content-Type` honored)
//! - `PUT    … + x-copy-source: /{src}/{key}` → server-side copy, empty body
//! - `DELETE {base}/{container}/{key}`       → remove object (404 tolerated)

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::CONTENT_TYPE;
use reqwest::{Client, StatusCode};
use tracing::debug;
use url::Url;

use sitepress_shared::{Result, SitePressError};

use crate::{ObjectMeta, ObjectStore};

/// User-Agent string for gateway requests.
const USER_AGENT: &str = concat!("SitePress/", env!("CARGO_PKG_VERSION"));

/// Header carrying the source object for a server-side copy.
const COPY_SOURCE_HEADER: &str = "x-copy-source";

/// Object store backed by an HTTP storage gateway.
#[derive(Debug, Clone)]
pub struct HttpStore {
    client: Client,
    base: Url,
    token: Option<String>,
}

impl HttpStore {
    /// Create a gateway client against `base`, with an optional bearer token.
    pub fn new(base: Url, token: Option<String>, request_timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .timeout(request_timeout)
            .build()
            .map_err(|e| SitePressError::Access(format!("failed to build HTTP client: {e}")))?;

        // `Url::join` drops the last path segment of a base without a
        // trailing slash, so an endpoint like `https://host/api` would lose
        // `/api` from every object URL.
        let mut base = base;
        if !base.path().ends_with('/') {
            let path = format!("{}/", base.path());
            base.set_path(&path);
        }

        Ok(Self {
            client,
            base,
            token,
        })
    }

    fn object_url(&self, container: &str, key: &str) -> Result<Url> {
        self.base
            .join(&format!("{container}/{key}"))
            .map_err(|e| SitePressError::Access(format!("bad object URL: {e}")))
    }

    fn authed(&self, req: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.token {
            Some(token) => req.bearer_auth(token),
            None => req,
        }
    }
}

#[async_trait]
impl ObjectStore for HttpStore {
    async fn list(&self, container: &str) -> Result<Vec<ObjectMeta>> {
        let mut url = self
            .base
            .join(container)
            .map_err(|e| SitePressError::Access(format!("bad container URL: {e}")))?;
        url.set_query(Some("list"));

        let response = self
            .authed(self.client.get(url))
            .send()
            .await
            .map_err(|e| SitePressError::Access(format!("list {container}: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(SitePressError::Access(format!(
                "list {container}: HTTP {status}"
            )));
        }

        let mut objects: Vec<ObjectMeta> = response
            .json()
            .await
            .map_err(|e| SitePressError::Access(format!("list {container}: {e}")))?;
        objects.sort_by(|a, b| a.key.cmp(&b.key));

        debug!(container, objects = objects.len(), "listed container");
        Ok(objects)
    }

    async fn get(&self, container: &str, key: &str) -> Result<Vec<u8>> {
        let url = self.object_url(container, key)?;
        let response = self
            .authed(self.client.get(url))
            .send()
            .await
            .map_err(|e| SitePressError::Access(format!("get {key}: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(SitePressError::Access(format!("get {key}: HTTP {status}")));
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| SitePressError::Access(format!("get {key}: {e}")))?;
        Ok(bytes.to_vec())
    }

    async fn put(
        &self,
        container: &str,
        key: &str,
        bytes: Vec<u8>,
        content_type: &str,
    ) -> Result<()> {
        let url = self.object_url(container, key)?;
        let response = self
            .authed(self.client.put(url))
            .header(CONTENT_TYPE, content_type)
            .body(bytes)
            .send()
            .await
            .map_err(|e| SitePressError::Access(format!("put {key}: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(SitePressError::Access(format!("put {key}: HTTP {status}")));
        }
        Ok(())
    }

    async fn copy(&self, src_container: &str, key: &str, dst_container: &str) -> Result<()> {
        let url = self.object_url(dst_container, key)?;
        let response = self
            .authed(self.client.put(url))
            .header(COPY_SOURCE_HEADER, format!("/{src_container}/{key}"))
            .send()
            .await
            .map_err(|e| SitePressError::Access(format!("copy {key}: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(SitePressError::Access(format!("copy {key}: HTTP {status}")));
        }
        Ok(())
    }

    async fn delete(&self, container: &str, key: &str) -> Result<()> {
        let url = self.object_url(container, key)?;
        let response = self
            .authed(self.client.delete(url))
            .send()
            .await
            .map_err(|e| SitePressError::Access(format!("delete {key}: {e}")))?;

        let status = response.status();
        if !status.is_success() && status != StatusCode::NOT_FOUND {
            return Err(SitePressError::Access(format!(
                "delete {key}: HTTP {status}"
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn store_for(server: &MockServer) -> HttpStore {
        let base = Url::parse(&format!("{}/", server.uri())).expect("base url");
        HttpStore::new(base, Some("secret-token".into()), Duration::from_secs(5))
            .expect("store")
    }

    #[tokio::test]
    async fn list_parses_and_sorts_metadata() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/content"))
            .and(header("authorization", "Bearer secret-token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([
                {"key": "b.md", "size_bytes": 20},
                {"key": "a.md", "size_bytes": 10}
            ])))
            .mount(&server)
            .await;

        let store = store_for(&server).await;
        let objects = store.list("content").await.expect("list");
        assert_eq!(objects.len(), 2);
        assert_eq!(objects[0].key, "a.md");
        assert_eq!(objects[1].size_bytes, 20);
    }

    #[tokio::test]
    async fn list_failure_is_access_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/content"))
            .respond_with(ResponseTemplate::new(403))
            .mount(&server)
            .await;

        let store = store_for(&server).await;
        let err = store.list("content").await.unwrap_err();
        assert!(err.to_string().contains("HTTP 403"));
    }

    #[tokio::test]
    async fn put_sends_content_type() {
        let server = MockServer::start().await;
        Mock::given(method("PUT"))
            .and(path("/web/css/site.css"))
            .and(header("content-type", "text/css"))
            .respond_with(ResponseTemplate::new(201))
            .mount(&server)
            .await;

        let store = store_for(&server).await;
        store
            .put("web", "css/site.css", b"body{}".to_vec(), "text/css")
            .await
            .expect("put");
    }

    #[tokio::test]
    async fn copy_sends_copy_source_header() {
        let server = MockServer::start().await;
        Mock::given(method("PUT"))
            .and(path("/web-backup/index.html"))
            .and(header("x-copy-source", "/web/index.html"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&server)
            .await;

        let store = store_for(&server).await;
        store.copy("web", "index.html", "web-backup").await.expect("copy");
    }

    #[tokio::test]
    async fn base_url_without_trailing_slash_keeps_its_path() {
        let server = MockServer::start().await;
        Mock::given(method("PUT"))
            .and(path("/api/web/index.html"))
            .respond_with(ResponseTemplate::new(201))
            .mount(&server)
            .await;

        let base = Url::parse(&format!("{}/api", server.uri())).expect("base url");
        let store = HttpStore::new(base, None, Duration::from_secs(5)).expect("store");
        store
            .put("web", "index.html", b"<html></html>".to_vec(), "text/html")
            .await
            .expect("put");
    }

    #[tokio::test]
    async fn delete_tolerates_missing_object() {
        let server = MockServer::start().await;
        Mock::given(method("DELETE"))
            .and(path("/web/ghost.html"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let store = store_for(&server).await;
        store.delete("web", "ghost.html").await.expect("delete");
    }
}
