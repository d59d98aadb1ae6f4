//! offline-cache-gate binary: boot, version transition, serve.

use std::sync::Arc;
use std::time::Instant;

use clap::Parser;
use tokio::net::TcpListener;
use tracing::{info, warn};

use offline_cache_gate::cache::persist;
use offline_cache_gate::cache::store::{new_shared_store, SharedCacheStore};
use offline_cache_gate::cache::strategy::CacheStrategies;
use offline_cache_gate::config::{Cli, Config};
use offline_cache_gate::net::fetcher::HttpFetcher;
use offline_cache_gate::server::gateway::{build_router, AppState};
use offline_cache_gate::worker::agent::CacheWorker;
use offline_cache_gate::worker::lifecycle::LifecycleController;
use offline_cache_gate::worker::router::RequestRouter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Parse CLI arguments.
    let cli = Cli::parse();

    // Initialize tracing/logging.
    let filter = if cli.verbose {
        "offline_cache_gate=debug,tower_http=debug"
    } else {
        "offline_cache_gate=info,tower_http=info"
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| filter.into()),
        )
        .with_target(true)
        .init();

    info!("offline-cache-gate v{}", env!("CARGO_PKG_VERSION"));

    // Load configuration.
    let mut config = Config::load(&cli.config)?;
    if let Some(listen) = cli.listen {
        config.server.listen = listen;
    }
    if let Some(upstream) = cli.upstream {
        config.upstream.origin = upstream;
    }
    let config = Arc::new(config);

    info!(
        upstream = %config.upstream.origin,
        precache = %config.cache.precache_name(),
        runtime = %config.cache.runtime_name(),
        manifest_assets = config.cache.precache_manifest.len(),
        "Configuration loaded"
    );

    // Restore any snapshot from a previous run before installing.
    let store: SharedCacheStore = match &config.persist.path {
        Some(dir) => match persist::load_store(dir).await {
            Ok(restored) => {
                info!(
                    namespaces = restored.names().len(),
                    entries = restored.total_entries(),
                    "Cache snapshot restored"
                );
                restored.into_shared()
            }
            Err(err) => {
                warn!(error = %err, "Snapshot restore failed, starting with an empty store");
                new_shared_store()
            }
        },
        None => new_shared_store(),
    };

    // Assemble the worker.
    let fetcher = Arc::new(HttpFetcher::new(config.upstream.fetch_timeout_secs)?);
    let router = RequestRouter::new(&config.upstream.origin, &config.upstream.api_prefix);
    let strategies = CacheStrategies::new(
        config.cache.precache_name(),
        config.cache.runtime_name(),
        config.fallback_url(),
    );
    let lifecycle = LifecycleController::new(
        store.clone(),
        config.cache.precache_name(),
        config.cache.runtime_name(),
        config.manifest_urls(),
    );
    let worker = Arc::new(CacheWorker::new(
        store.clone(),
        fetcher,
        router,
        strategies,
        lifecycle,
        config.cache.sync_tag.clone(),
    ));

    // Version transition: install, then activate, before routing anything.
    // A failed install leaves the previous cache state untouched and the
    // gateway passing requests through uncached.
    match worker.on_install().await {
        Ok(assets) => {
            info!(assets, "Precache installed");
            let deleted = worker.on_activate().await;
            info!(deleted, "Activated");
            snapshot(&store, &config).await;
        }
        Err(err) => {
            warn!(error = %err, "Install failed; serving pass-through without a fresh precache");
        }
    }

    // Build application state and the HTTP router.
    let state = Arc::new(AppState {
        worker,
        store: store.clone(),
        config: config.clone(),
        start_time: Instant::now(),
    });
    let app = build_router(state);

    // Start the server.
    let listen_addr = config.server.listen.clone();
    info!(addr = listen_addr, "Starting gateway");

    let listener = TcpListener::bind(&listen_addr).await?;
    info!("Listening on {listen_addr}");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    // One final snapshot so the next run starts warm.
    snapshot(&store, &config).await;

    Ok(())
}

async fn snapshot(store: &SharedCacheStore, config: &Config) {
    let Some(dir) = &config.persist.path else {
        return;
    };
    let guard = store.read().await;
    match persist::save_store(&guard, dir, config.persist.zstd_level).await {
        Ok(files) => info!(files, "Cache snapshot written"),
        Err(err) => warn!(error = %err, "Failed to write cache snapshot"),
    }
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        warn!(error = %err, "Failed to listen for shutdown signal");
    }
}
