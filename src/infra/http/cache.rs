//! Short-lived in-memory cache for idempotent reads.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use dashmap::DashMap;
use tokio::time::Instant;
use tracing::debug;

use super::{ApiRequest, ApiResponse, Middleware, Next};
use crate::domain::HttpError;

/// Default lifetime of a cached response
pub const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(5 * 60);

/// Stored snapshot of a successful response
#[derive(Debug, Clone)]
pub struct CachedResponse {
    pub response: ApiResponse,
    pub stored_at: Instant,
}

/// URL-keyed response store, shared across the whole client
pub struct ResponseCache {
    entries: DashMap<String, CachedResponse>,
    ttl: Duration,
}

impl ResponseCache {
    #[must_use]
    pub fn new(ttl: Duration) -> Self {
        Self {
            entries: DashMap::new(),
            ttl,
        }
    }

    #[must_use]
    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Fresh copy of the entry for `key`, if it is still within TTL.
    /// Expired entries are left in place and overwritten on the next store.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<ApiResponse> {
        let entry = self.entries.get(key)?;
        if entry.stored_at.elapsed() < self.ttl {
            Some(entry.response.clone())
        } else {
            None
        }
    }

    pub fn insert(&self, key: impl Into<String>, response: ApiResponse) {
        self.entries.insert(
            key.into(),
            CachedResponse {
                response,
                stored_at: Instant::now(),
            },
        );
    }

    pub fn clear(&self) {
        self.entries.clear();
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Default for ResponseCache {
    fn default() -> Self {
        Self::new(DEFAULT_CACHE_TTL)
    }
}

/// Pipeline stage serving eligible GETs from a [`ResponseCache`]
pub struct CacheLayer {
    store: Arc<ResponseCache>,
}

impl CacheLayer {
    #[must_use]
    pub fn new(store: Arc<ResponseCache>) -> Self {
        Self { store }
    }

    /// GETs only, never auth or transfer endpoints, never when bypassed
    #[must_use]
    pub fn is_cacheable(request: &ApiRequest) -> bool {
        let path = request.path();
        request.is_get()
            && !request.skip_cache
            && !path.contains("/auth/")
            && !path.contains("/transfers")
    }
}

#[async_trait]
impl Middleware for CacheLayer {
    fn name(&self) -> &'static str {
        "cache"
    }

    async fn handle(&self, request: ApiRequest, next: Next<'_>) -> Result<ApiResponse, HttpError> {
        if !Self::is_cacheable(&request) {
            return next.run(request).await;
        }

        let key = request.url.to_string();
        if let Some(hit) = self.store.get(&key) {
            debug!(url = %key, "Cache hit");
            return Ok(hit);
        }

        let response = next.run(request).await?;
        debug!(url = %key, "Cache set");
        self.store.insert(key, response.clone());
        Ok(response)
    }
}
