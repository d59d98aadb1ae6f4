//! The cache worker: an explicit event surface over router, strategies and
//! lifecycle.
//!
//! Instead of listeners hanging off a global scope, the worker exposes
//! `on_install` / `on_activate` / `on_fetch` / `on_message` / `on_sync`
//! methods the gateway (and tests) call directly.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::cache::entry::{CachedResponse, RequestDescriptor};
use crate::cache::store::SharedCacheStore;
use crate::cache::strategy::CacheStrategies;
use crate::net::fetcher::{Fetcher, NetworkError};
use crate::worker::lifecycle::{InstallError, LifecycleController};
use crate::worker::router::{RequestRouter, StrategyKind};

/// Control-channel commands (client → worker). Fire-and-forget: no reply.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Command {
    /// Force an installed-but-waiting instance to activate immediately.
    #[serde(rename = "SKIP_WAITING")]
    SkipWaiting,
    /// Delete every cache namespace, regardless of version. Destructive;
    /// meant for explicit user-triggered resets.
    #[serde(rename = "CLEAR_CACHE")]
    ClearCache,
}

/// One worker instance: intercepts requests for the page's lifetime once
/// activated, and owns the version transition before that.
pub struct CacheWorker {
    store: SharedCacheStore,
    fetcher: Arc<dyn Fetcher>,
    router: RequestRouter,
    strategies: CacheStrategies,
    lifecycle: LifecycleController,
    sync_tag: String,
}

impl CacheWorker {
    pub fn new(
        store: SharedCacheStore,
        fetcher: Arc<dyn Fetcher>,
        router: RequestRouter,
        strategies: CacheStrategies,
        lifecycle: LifecycleController,
        sync_tag: impl Into<String>,
    ) -> Self {
        Self {
            store,
            fetcher,
            router,
            strategies,
            lifecycle,
            sync_tag: sync_tag.into(),
        }
    }

    pub fn lifecycle(&self) -> &LifecycleController {
        &self.lifecycle
    }

    pub fn store(&self) -> &SharedCacheStore {
        &self.store
    }

    /// Run the install step for this version.
    pub async fn on_install(&self) -> Result<usize, InstallError> {
        self.lifecycle.install(self.fetcher.as_ref()).await
    }

    /// Run the activate step. Returns the number of stale namespaces deleted.
    pub async fn on_activate(&self) -> usize {
        self.lifecycle.activate().await
    }

    /// Fetch interception.
    ///
    /// `None` means the request is not intercepted — the caller talks to the
    /// network directly. Requests are only routed once this instance is
    /// activated; before that everything passes through.
    pub async fn on_fetch(
        &self,
        request: &RequestDescriptor,
    ) -> Option<Result<CachedResponse, NetworkError>> {
        if !self.lifecycle.is_active().await {
            return None;
        }
        let strategy = self.router.route(request)?;
        debug!(url = %request.url, strategy = ?strategy, "routing request");

        let result = match strategy {
            StrategyKind::CacheFirst => {
                self.strategies
                    .cache_first(&self.store, self.fetcher.as_ref(), request)
                    .await
            }
            StrategyKind::NetworkFirst => {
                self.strategies
                    .network_first(&self.store, self.fetcher.as_ref(), request)
                    .await
            }
        };
        Some(result)
    }

    /// Plain uncached network fetch, used for pass-through requests.
    pub async fn fetch_direct(
        &self,
        request: &RequestDescriptor,
    ) -> Result<CachedResponse, NetworkError> {
        self.fetcher.fetch(request).await
    }

    /// Handle a control-channel command.
    pub async fn on_message(&self, command: Command) {
        match command {
            Command::SkipWaiting => {
                info!("skip-waiting requested by client");
                self.lifecycle.skip_waiting();
            }
            Command::ClearCache => {
                self.lifecycle.clear_caches().await;
            }
        }
    }

    /// Background-sync trigger. The recognized tag completes immediately;
    /// anything else is ignored.
    pub async fn on_sync(&self, tag: &str) {
        if tag == self.sync_tag {
            info!(tag, "background sync triggered");
        } else {
            debug!(tag, "ignoring unknown sync tag");
        }
    }
}
