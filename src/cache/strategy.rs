//! Request-handling strategies: cache-first and network-first.
//!
//! Each strategy is an ordered attempt sequence over a network fetcher and a
//! named cache namespace. Within one request the steps are strictly
//! sequential; across requests nothing coordinates — two concurrent misses
//! for the same URL both fetch and the last write wins.

use tracing::{debug, warn};

use crate::cache::entry::{CacheKey, CachedResponse, RequestDescriptor};
use crate::cache::store::SharedCacheStore;
use crate::net::fetcher::{Fetcher, NetworkError};

/// The two strategies, configured with the namespaces they operate on and
/// the offline fallback document.
///
/// Namespace names are injected at construction so tests can run against
/// distinct namespaces without cross-test contamination.
pub struct CacheStrategies {
    precache_name: String,
    runtime_name: String,
    fallback_key: CacheKey,
}

impl CacheStrategies {
    /// `fallback_url` is the absolute URL of the application's root document
    /// (typically `{origin}/index.html`), served when the network is down and
    /// nothing better is cached.
    pub fn new(
        precache_name: impl Into<String>,
        runtime_name: impl Into<String>,
        fallback_url: impl Into<String>,
    ) -> Self {
        Self {
            precache_name: precache_name.into(),
            runtime_name: runtime_name.into(),
            fallback_key: CacheKey::get(fallback_url),
        }
    }

    /// Cache first: serve static assets from the precache, fetch on miss,
    /// write through on success.
    ///
    /// On a hit the network is never consulted. On a miss the fetched
    /// response is stored only if it is ok (and a GET); non-ok responses pass
    /// through uncached. If the fetch itself fails, the cached root document
    /// stands in when present; otherwise the failure propagates.
    pub async fn cache_first(
        &self,
        store: &SharedCacheStore,
        fetcher: &dyn Fetcher,
        request: &RequestDescriptor,
    ) -> Result<CachedResponse, NetworkError> {
        let key = request.cache_key();

        if let Some(hit) = store.read().await.lookup(&self.precache_name, &key) {
            debug!(url = %request.url, "precache hit");
            return Ok(hit);
        }

        match fetcher.fetch(request).await {
            Ok(response) => {
                if response.is_ok() && request.method == "GET" {
                    debug!(url = %request.url, "caching new asset");
                    store
                        .write()
                        .await
                        .insert(&self.precache_name, key, response.clone());
                }
                Ok(response)
            }
            Err(err) => {
                if let Some(fallback) = store.read().await.lookup(&self.precache_name, &self.fallback_key)
                {
                    warn!(url = %request.url, error = %err, "network down, serving offline fallback");
                    return Ok(fallback);
                }
                Err(err)
            }
        }
    }

    /// Network first: documents and API responses must be fresh whenever
    /// connectivity exists; the runtime cache is purely a degraded-mode
    /// fallback.
    ///
    /// A successful ok response overwrites the runtime entry even if a stale
    /// copy exists. On fetch failure the fallback order is runtime entry,
    /// then (documents only) the precached root document, then propagation.
    pub async fn network_first(
        &self,
        store: &SharedCacheStore,
        fetcher: &dyn Fetcher,
        request: &RequestDescriptor,
    ) -> Result<CachedResponse, NetworkError> {
        let key = request.cache_key();

        match fetcher.fetch(request).await {
            Ok(response) => {
                if response.is_ok() && request.method == "GET" {
                    store
                        .write()
                        .await
                        .insert(&self.runtime_name, key, response.clone());
                }
                Ok(response)
            }
            Err(err) => {
                debug!(url = %request.url, error = %err, "network down, trying runtime cache");
                if let Some(cached) = store.read().await.lookup(&self.runtime_name, &key) {
                    return Ok(cached);
                }
                if request.is_document() {
                    if let Some(fallback) =
                        store.read().await.lookup(&self.precache_name, &self.fallback_key)
                    {
                        warn!(url = %request.url, "serving offline fallback document");
                        return Ok(fallback);
                    }
                }
                Err(err)
            }
        }
    }
}
