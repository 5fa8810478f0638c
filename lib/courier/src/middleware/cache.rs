//! On-disk response cache.
//!
//! Sits directly in front of the raw hyper transport. Only `GET` requests
//! are looked up, and only `200` responses whose `Cache-Control` carries a
//! positive `max-age` (and neither `no-store` nor `no-cache`) are stored. A
//! request sending `Cache-Control: no-cache` skips the lookup but may still
//! refresh the entry.
//!
//! Each entry is two files named after the SHA-256 of the URL: `<key>.meta`
//! (JSON: status, headers, expiry) and `<key>.body`. When the bodies exceed
//! the configured size, the oldest entries are evicted first.

use std::future::Future;
use std::path::PathBuf;
use std::pin::Pin;
use std::sync::{Arc, Mutex, PoisonError};
use std::task::{Context, Poll};
use std::time::{SystemTime, UNIX_EPOCH};

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tokio::sync::OnceCell;
use tower::{Layer, Service, ServiceExt};
use tracing::{debug, warn};

use crate::config::CacheConfig;
use crate::{Error, Headers, Method, Request, Response, Result};

/// Layer adding the response cache.
#[derive(Debug, Clone)]
pub struct CacheLayer {
    store: Arc<CacheStore>,
}

impl CacheLayer {
    /// Creates the layer. Nothing touches the disk until the first request.
    #[must_use]
    pub fn new(config: CacheConfig) -> Self {
        Self {
            store: Arc::new(CacheStore {
                directory: config.directory,
                max_bytes: config.max_bytes,
                ready: OnceCell::new(),
                index: Mutex::new(IndexMap::new()),
            }),
        }
    }
}

impl<S> Layer<S> for CacheLayer {
    type Service = Cache<S>;

    fn layer(&self, inner: S) -> Self::Service {
        Cache {
            inner,
            store: Arc::clone(&self.store),
        }
    }
}

/// Service serving and storing cached responses.
#[derive(Debug, Clone)]
pub struct Cache<S> {
    inner: S,
    store: Arc<CacheStore>,
}

impl<S> Service<Request> for Cache<S>
where
    S: Service<Request, Response = Response, Error = Error> + Clone + Send + 'static,
    S::Future: Send,
{
    type Response = Response;
    type Error = Error;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response>> + Send>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<()>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, request: Request) -> Self::Future {
        let inner = self.inner.clone();
        let url = match request.url() {
            Some(url) if request.method() == Method::Get => url.to_string(),
            _ => return Box::pin(async move { inner.oneshot(request).await }),
        };
        let store = Arc::clone(&self.store);

        Box::pin(async move {
            store.ensure_ready().await?;

            let key = cache_key(&url);
            let bypass = request
                .headers()
                .get_all("Cache-Control")
                .any(|value| has_directive(value, &["no-cache", "no-store", "max-age=0"]));

            if !bypass && let Some(response) = store.lookup(&key).await {
                debug!(%url, "served from cache");
                return Ok(response);
            }

            let no_store = request
                .headers()
                .get_all("Cache-Control")
                .any(|value| has_directive(value, &["no-store"]));
            let response = inner.oneshot(request).await?;

            if let Some(max_age) = cacheable_for(&response).filter(|_| !no_store) {
                match store.insert(&key, &url, &response, max_age).await {
                    Ok(()) => debug!(%url, max_age, "stored in cache"),
                    Err(err) => warn!(%url, error = %err, "cannot store response in cache"),
                }
            }

            Ok(response)
        })
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct CacheMeta {
    url: String,
    status: u16,
    headers: Vec<(String, String)>,
    expires_at: u64,
}

#[derive(Debug)]
struct CacheStore {
    directory: PathBuf,
    max_bytes: u64,
    ready: OnceCell<()>,
    /// Body size per key, oldest first.
    index: Mutex<IndexMap<String, u64>>,
}

impl CacheStore {
    async fn ensure_ready(&self) -> Result<()> {
        self.ready
            .get_or_try_init(|| async {
                tokio::fs::create_dir_all(&self.directory)
                    .await
                    .map_err(|e| self.error("cannot create cache directory", &e))?;
                self.load_index().await
            })
            .await
            .map(|_| ())
    }

    async fn load_index(&self) -> Result<()> {
        let mut entries = tokio::fs::read_dir(&self.directory)
            .await
            .map_err(|e| self.error("cannot read cache directory", &e))?;

        let mut found = Vec::new();
        while let Ok(Some(entry)) = entries.next_entry().await {
            let path = entry.path();
            if path.extension().is_none_or(|extension| extension != "body") {
                continue;
            }
            let Some(key) = path.file_stem().and_then(|stem| stem.to_str()) else {
                continue;
            };
            if let Ok(metadata) = entry.metadata().await {
                let modified = metadata.modified().unwrap_or(UNIX_EPOCH);
                found.push((modified, key.to_string(), metadata.len()));
            }
        }
        found.sort();

        let mut index = self.index.lock().unwrap_or_else(PoisonError::into_inner);
        index.extend(found.into_iter().map(|(_, key, size)| (key, size)));
        Ok(())
    }

    async fn lookup(&self, key: &str) -> Option<Response> {
        let meta = tokio::fs::read(self.meta_path(key)).await.ok()?;
        let meta: CacheMeta = serde_json::from_slice(&meta).ok()?;

        if meta.expires_at <= now_secs() {
            self.remove(key).await;
            return None;
        }

        let body = tokio::fs::read(self.body_path(key)).await.ok()?;
        Some(Response::new(
            meta.status,
            meta.headers.into_iter().collect(),
            body,
        ))
    }

    async fn insert(&self, key: &str, url: &str, response: &Response, max_age: u64) -> Result<()> {
        let size = u64::try_from(response.body().len()).unwrap_or(u64::MAX);
        if size > self.max_bytes {
            return Ok(());
        }

        let meta = CacheMeta {
            url: url.to_string(),
            status: response.status(),
            headers: response
                .headers()
                .iter()
                .map(|(name, value)| (name.to_string(), value.to_string()))
                .collect(),
            expires_at: now_secs().saturating_add(max_age),
        };
        let meta = serde_json::to_vec(&meta).map_err(|e| Error::cache(e.to_string()))?;

        tokio::fs::write(self.body_path(key), response.body())
            .await
            .map_err(|e| self.error("cannot write cache entry", &e))?;
        tokio::fs::write(self.meta_path(key), meta)
            .await
            .map_err(|e| self.error("cannot write cache entry", &e))?;

        let evicted = {
            let mut index = self.index.lock().unwrap_or_else(PoisonError::into_inner);
            index.shift_remove(key);
            index.insert(key.to_string(), size);

            let mut total: u64 = index.values().sum();
            let mut evicted = Vec::new();
            while total > self.max_bytes {
                let Some((oldest, oldest_size)) = index.shift_remove_index(0) else {
                    break;
                };
                total -= oldest_size;
                evicted.push(oldest);
            }
            evicted
        };

        for key in evicted {
            debug!(%key, "evicting cache entry");
            self.remove(&key).await;
        }
        Ok(())
    }

    async fn remove(&self, key: &str) {
        self.index
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .shift_remove(key);
        let _ = tokio::fs::remove_file(self.meta_path(key)).await;
        let _ = tokio::fs::remove_file(self.body_path(key)).await;
    }

    fn meta_path(&self, key: &str) -> PathBuf {
        self.directory.join(format!("{key}.meta"))
    }

    fn body_path(&self, key: &str) -> PathBuf {
        self.directory.join(format!("{key}.body"))
    }

    fn error(&self, context: &str, err: &std::io::Error) -> Error {
        Error::cache(format!("{context} {}: {err}", self.directory.display()))
    }
}

fn cache_key(url: &str) -> String {
    hex::encode(Sha256::digest(url.as_bytes()))
}

fn now_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |elapsed| elapsed.as_secs())
}

fn has_directive(value: &str, wanted: &[&str]) -> bool {
    value
        .split(',')
        .map(|directive| directive.trim().to_ascii_lowercase())
        .any(|directive| wanted.contains(&directive.as_str()))
}

/// Seconds a response may be served from the cache, if at all.
fn cacheable_for(response: &Response) -> Option<u64> {
    if response.status() != 200 {
        return None;
    }

    let mut max_age = None;
    for value in response.headers().get_all("Cache-Control") {
        if has_directive(value, &["no-store", "no-cache"]) {
            return None;
        }
        for directive in value.split(',') {
            if let Some(seconds) = directive.trim().to_ascii_lowercase().strip_prefix("max-age=") {
                max_age = seconds.trim_matches('"').parse::<u64>().ok();
            }
        }
    }
    max_age.filter(|seconds| *seconds > 0)
}

#[cfg(test)]
mod tests {
    use bytes::Bytes;

    use super::*;

    fn response(status: u16, cache_control: &str) -> Response {
        let headers: Headers = [("Cache-Control", cache_control)].into_iter().collect();
        Response::new(status, headers, Bytes::from_static(b"{}"))
    }

    #[test]
    fn key_is_sha256_hex() {
        let key = cache_key("https://example.com/facts");
        assert_eq!(key.len(), 64);
        assert!(key.chars().all(|c| c.is_ascii_hexdigit()));
        assert_eq!(key, cache_key("https://example.com/facts"));
        assert_ne!(key, cache_key("https://example.com/facts?page=2"));
    }

    #[test]
    fn cacheable_responses() {
        assert_eq!(cacheable_for(&response(200, "public, max-age=60")), Some(60));
        assert_eq!(cacheable_for(&response(200, "max-age=0")), None);
        assert_eq!(cacheable_for(&response(200, "no-store, max-age=60")), None);
        assert_eq!(cacheable_for(&response(200, "No-Cache")), None);
        assert_eq!(cacheable_for(&response(404, "max-age=60")), None);
        assert_eq!(
            cacheable_for(&Response::new(200, Headers::new(), Bytes::new())),
            None
        );
    }

    #[test]
    fn directives_are_case_insensitive() {
        assert!(has_directive("public, NO-CACHE", &["no-cache"]));
        assert!(!has_directive("max-age=10", &["no-cache"]));
    }
}
