//! Response cache middleware for the home listing.
//!
//! Only the unparameterized view is cached: a request carrying any query
//! string (`/?page=2`) bypasses the slot entirely, so pages never overwrite
//! each other under the shared key.

use std::sync::Arc;

use axum::{
    body::Body,
    extract::State,
    http::{Method, Request},
    middleware::Next,
    response::Response,
};
use tracing::warn;

use super::store::{FeedCache, buffer_response, should_store_response};

pub async fn index_cache_layer(
    State(cache): State<Arc<FeedCache>>,
    request: Request<Body>,
    next: Next,
) -> Response {
    if !cache.is_enabled() || request.method() != Method::GET || request.uri().query().is_some() {
        return next.run(request).await;
    }

    if let Some(cached) = cache.get() {
        return cached.into_response();
    }

    let response = next.run(request).await;
    if !should_store_response(&response) {
        return response;
    }

    match buffer_response(response).await {
        Ok((rebuilt, cached)) => {
            cache.put(cached);
            rebuilt
        }
        Err((rebuilt, error)) => {
            warn!(
                target = "yatube::cache::middleware",
                key = cache.key(),
                error = %error,
                "failed to buffer home listing for caching"
            );
            rebuilt
        }
    }
}
