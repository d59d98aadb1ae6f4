//! Worker lifecycle: install, activate, takeover, teardown.
//!
//! One controller instance exists per deployed version. `install` populates
//! the version's precache atomically; `activate` retires every namespace
//! from older versions and claims the clients, after which the router may
//! start serving.

use std::sync::atomic::{AtomicBool, Ordering};

use futures::future::try_join_all;
use thiserror::Error;
use tokio::sync::RwLock;
use tracing::{info, warn};

use crate::cache::entry::{CachedResponse, RequestDescriptor};
use crate::cache::store::SharedCacheStore;
use crate::net::fetcher::{Fetcher, NetworkError};

/// Lifecycle phases of a worker instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerPhase {
    /// Created, nothing installed yet.
    New,
    /// Precache manifest fetch in flight.
    Installing,
    /// Precache complete, eligible for activation.
    Installed,
    /// Stale-namespace cleanup in flight.
    Activating,
    /// Serving; all clients claimed.
    Activated,
    /// Install failed; this instance will never serve.
    Redundant,
}

impl std::fmt::Display for WorkerPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            WorkerPhase::New => "new",
            WorkerPhase::Installing => "installing",
            WorkerPhase::Installed => "installed",
            WorkerPhase::Activating => "activating",
            WorkerPhase::Activated => "activated",
            WorkerPhase::Redundant => "redundant",
        };
        write!(f, "{name}")
    }
}

#[derive(Error, Debug)]
pub enum InstallError {
    #[error("precache fetch for {url} failed: {source}")]
    AssetFetch {
        url: String,
        #[source]
        source: NetworkError,
    },

    #[error("precache asset {url} returned status {status}")]
    AssetStatus { url: String, status: u16 },

    #[error("install is not valid in the {0} phase")]
    WrongPhase(WorkerPhase),
}

/// Brings a worker version online and retires superseded cache state.
pub struct LifecycleController {
    store: SharedCacheStore,
    precache_name: String,
    runtime_name: String,
    /// Absolute URLs of the essential assets precached at install.
    manifest: Vec<String>,
    phase: RwLock<WorkerPhase>,
    skip_waiting: AtomicBool,
    controls_clients: AtomicBool,
}

impl LifecycleController {
    pub fn new(
        store: SharedCacheStore,
        precache_name: impl Into<String>,
        runtime_name: impl Into<String>,
        manifest: Vec<String>,
    ) -> Self {
        Self {
            store,
            precache_name: precache_name.into(),
            runtime_name: runtime_name.into(),
            manifest,
            phase: RwLock::new(WorkerPhase::New),
            skip_waiting: AtomicBool::new(false),
            controls_clients: AtomicBool::new(false),
        }
    }

    pub async fn phase(&self) -> WorkerPhase {
        *self.phase.read().await
    }

    /// Whether this instance may activate without waiting for old clients.
    pub fn skip_waiting_requested(&self) -> bool {
        self.skip_waiting.load(Ordering::SeqCst)
    }

    /// Whether this instance has claimed the open clients.
    pub fn controls_clients(&self) -> bool {
        self.controls_clients.load(Ordering::SeqCst)
    }

    /// Whether requests may be routed through this instance.
    pub async fn is_active(&self) -> bool {
        *self.phase.read().await == WorkerPhase::Activated
    }

    /// Force an installed instance to become eligible for immediate
    /// activation (the `SKIP_WAITING` command).
    pub fn skip_waiting(&self) {
        self.skip_waiting.store(true, Ordering::SeqCst);
    }

    /// Fetch and store the whole precache manifest as one batch.
    ///
    /// All assets are fetched concurrently; if any one fails (transport error
    /// or non-ok status) nothing is written and the instance becomes
    /// `Redundant` — there is no partial precache. On success the instance is
    /// `Installed` and skip-waiting is signaled, so activation need not wait
    /// for existing clients to close.
    pub async fn install(&self, fetcher: &dyn Fetcher) -> Result<usize, InstallError> {
        {
            let mut phase = self.phase.write().await;
            if !matches!(*phase, WorkerPhase::New | WorkerPhase::Redundant) {
                return Err(InstallError::WrongPhase(*phase));
            }
            *phase = WorkerPhase::Installing;
        }

        info!(
            assets = self.manifest.len(),
            namespace = %self.precache_name,
            "installing precache manifest"
        );

        let fetches = self.manifest.iter().map(|url| {
            let request = RequestDescriptor::from_url(url);
            async move {
                let response =
                    fetcher
                        .fetch(&request)
                        .await
                        .map_err(|source| InstallError::AssetFetch {
                            url: request.url.clone(),
                            source,
                        })?;
                if !response.is_ok() {
                    return Err(InstallError::AssetStatus {
                        url: request.url.clone(),
                        status: response.status,
                    });
                }
                Ok::<(RequestDescriptor, CachedResponse), InstallError>((request, response))
            }
        });

        let fetched = match try_join_all(fetches).await {
            Ok(fetched) => fetched,
            Err(err) => {
                *self.phase.write().await = WorkerPhase::Redundant;
                warn!(error = %err, "install aborted, precache left untouched");
                return Err(err);
            }
        };

        let count = fetched.len();
        {
            let mut store = self.store.write().await;
            store.open(&self.precache_name);
            for (request, response) in fetched {
                store.insert(&self.precache_name, request.cache_key(), response);
            }
        }

        *self.phase.write().await = WorkerPhase::Installed;
        // A complete precache means there is no reason to keep clients on the
        // previous version.
        self.skip_waiting.store(true, Ordering::SeqCst);
        info!(assets = count, namespace = %self.precache_name, "install complete");

        Ok(count)
    }

    /// Retire every namespace from older versions, then claim all clients.
    ///
    /// Deletion is best-effort per namespace: one stale namespace failing to
    /// delete never blocks the others or the claim. The store's write lock is
    /// held across the sweep, so no request is routed against a half-cleaned
    /// store. Re-running when only current-version namespaces exist deletes
    /// nothing. Returns the number of namespaces deleted.
    pub async fn activate(&self) -> usize {
        {
            let mut phase = self.phase.write().await;
            match *phase {
                WorkerPhase::Installed | WorkerPhase::Activated => {
                    *phase = WorkerPhase::Activating
                }
                other => {
                    warn!(phase = %other, "activate called out of phase, ignoring");
                    return 0;
                }
            }
        }

        let mut deleted = 0;
        {
            let mut store = self.store.write().await;
            store.open(&self.precache_name);
            store.open(&self.runtime_name);
            for name in store.names() {
                if name == self.precache_name || name == self.runtime_name {
                    continue;
                }
                if store.delete(&name) {
                    info!(namespace = %name, "deleted stale cache namespace");
                    deleted += 1;
                } else {
                    warn!(namespace = %name, "stale namespace vanished mid-sweep, continuing");
                }
            }
        }

        *self.phase.write().await = WorkerPhase::Activated;
        self.controls_clients.store(true, Ordering::SeqCst);
        info!(deleted, "activation complete, all clients claimed");

        deleted
    }

    /// Delete every namespace unconditionally (the `CLEAR_CACHE` command).
    /// Returns the number of namespaces deleted.
    pub async fn clear_caches(&self) -> usize {
        let count = self.store.write().await.clear_all();
        info!(namespaces = count, "cleared every cache namespace");
        count
    }
}
