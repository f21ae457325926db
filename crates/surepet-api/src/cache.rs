// ── Conditional-request cache ──
//
// Last known body and validator per exact request URL. The dispatcher
// sends the stored ETag back on the next request for the same URL and
// serves the stored body when the server answers 304.

use std::sync::Arc;

use dashmap::DashMap;
use serde_json::Value;

/// One cached response: the parsed body and its validator, if any.
#[derive(Debug, Clone, PartialEq)]
pub struct CachedResource {
    pub url: String,
    pub body: Arc<Value>,
    pub etag: Option<String>,
}

/// Process-lifetime store of the last successful body per URL.
///
/// Keys are the full request URL including ids and query string, so
/// paginated and per-entity endpoints cache independently. Nothing is
/// ever evicted; every 200 overwrites the entry in place.
#[derive(Debug, Default)]
pub struct ResourceCache {
    entries: DashMap<String, CachedResource>,
}

impl ResourceCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, url: &str) -> Option<CachedResource> {
        self.entries.get(url).map(|r| r.value().clone())
    }

    /// The cached body for `url`.
    pub fn body(&self, url: &str) -> Option<Arc<Value>> {
        self.entries.get(url).map(|r| Arc::clone(&r.body))
    }

    /// The validator to send with the next request for `url`.
    pub fn etag(&self, url: &str) -> Option<String> {
        self.entries.get(url).and_then(|r| r.etag.clone())
    }

    /// Record a fresh 200/201 body and hand back the shared copy.
    ///
    /// An absent `etag` clears the old one, since it no longer describes
    /// the stored body.
    pub fn put(&self, url: &str, body: Value, etag: Option<String>) -> Arc<Value> {
        let body = Arc::new(body);
        self.entries.insert(
            url.to_owned(),
            CachedResource {
                url: url.to_owned(),
                body: Arc::clone(&body),
                etag,
            },
        );
        body
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
