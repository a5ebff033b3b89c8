//! Single-slot, time-boxed store for the rendered home listing.

use std::{
    sync::{Arc, RwLock},
    time::{Duration, Instant},
};

use axum::{
    body::Body,
    http::{HeaderMap, HeaderName, HeaderValue, StatusCode, header},
    response::Response,
};
use bytes::Bytes;
use http_body_util::BodyExt;
use metrics::counter;
use thiserror::Error;
use tracing::debug;

use super::{
    clock::Clock,
    config::FeedCacheConfig,
    lock::{rw_read, rw_write},
};

const LOCK_TARGET: &str = "cache::store";

/// Buffered copy of a response that can be replayed byte for byte.
#[derive(Debug, Clone)]
pub struct CachedResponse {
    status: StatusCode,
    headers: Vec<(HeaderName, HeaderValue)>,
    body: Bytes,
}

impl CachedResponse {
    pub fn new(status: StatusCode, headers: &HeaderMap, body: Bytes) -> Self {
        Self {
            status,
            headers: headers
                .iter()
                .map(|(name, value)| (name.clone(), value.clone()))
                .collect(),
            body,
        }
    }

    pub fn body(&self) -> &Bytes {
        &self.body
    }

    pub fn into_response(self) -> Response {
        let mut response = Response::new(Body::from(self.body));
        *response.status_mut() = self.status;

        let headers = response.headers_mut();
        for (name, value) in self.headers {
            headers.append(name, value);
        }
        response
    }
}

#[derive(Debug, Error)]
pub enum CacheStoreError {
    #[error("failed to buffer response body: {0}")]
    Buffer(String),
}

/// Only plain successful pages are worth replaying.
pub fn should_store_response(response: &Response) -> bool {
    response.status() == StatusCode::OK && !response.headers().contains_key(header::SET_COOKIE)
}

/// Collect the body so it can be both cached and sent.
pub async fn buffer_response(
    response: Response,
) -> Result<(Response, CachedResponse), (Response, CacheStoreError)> {
    let (parts, body) = response.into_parts();
    match BodyExt::collect(body).await {
        Ok(collected) => {
            let bytes = collected.to_bytes();
            let cached = CachedResponse::new(parts.status, &parts.headers, bytes.clone());
            Ok((Response::from_parts(parts, Body::from(bytes)), cached))
        }
        Err(error) => Err((
            Response::from_parts(parts, Body::empty()),
            CacheStoreError::Buffer(error.to_string()),
        )),
    }
}

struct Entry {
    stored_at: Instant,
    response: CachedResponse,
}

/// Home feed cache: one fixed key, a TTL and an injected clock.
///
/// Entries are never invalidated by writes. A stored page is served until it
/// is older than the TTL or [`FeedCache::clear`] is called.
pub struct FeedCache {
    config: FeedCacheConfig,
    clock: Arc<dyn Clock>,
    slot: RwLock<Option<Entry>>,
}

impl FeedCache {
    pub fn new(config: FeedCacheConfig, clock: Arc<dyn Clock>) -> Self {
        Self {
            config,
            clock,
            slot: RwLock::new(None),
        }
    }

    pub fn key(&self) -> &'static str {
        self.config.key
    }

    pub fn ttl(&self) -> Duration {
        self.config.ttl
    }

    pub fn is_enabled(&self) -> bool {
        self.config.enabled
    }

    /// Stored response if it is still fresh. Stale entries are dropped.
    pub fn get(&self) -> Option<CachedResponse> {
        let now = self.clock.now();
        {
            let slot = rw_read(&self.slot, LOCK_TARGET, "get");
            if let Some(entry) = slot.as_ref()
                && now.saturating_duration_since(entry.stored_at) < self.config.ttl
            {
                counter!("yatube_index_cache_hit_total").increment(1);
                debug!(key = self.config.key, outcome = "hit", "feed cache lookup");
                return Some(entry.response.clone());
            }
        }

        let mut slot = rw_write(&self.slot, LOCK_TARGET, "evict");
        if slot
            .as_ref()
            .is_some_and(|entry| now.saturating_duration_since(entry.stored_at) >= self.config.ttl)
        {
            *slot = None;
            debug!(key = self.config.key, "expired feed cache entry evicted");
        }

        counter!("yatube_index_cache_miss_total").increment(1);
        debug!(key = self.config.key, outcome = "miss", "feed cache lookup");
        None
    }

    pub fn put(&self, response: CachedResponse) {
        let entry = Entry {
            stored_at: self.clock.now(),
            response,
        };
        *rw_write(&self.slot, LOCK_TARGET, "put") = Some(entry);
        counter!("yatube_index_cache_store_total").increment(1);
        debug!(key = self.config.key, "feed cache populated");
    }

    /// Empty the slot. Returns whether anything was stored.
    pub fn clear(&self) -> bool {
        let removed = rw_write(&self.slot, LOCK_TARGET, "clear").take().is_some();
        counter!("yatube_index_cache_clear_total").increment(1);
        debug!(key = self.config.key, removed, "feed cache cleared");
        removed
    }
}
