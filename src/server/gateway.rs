//! HTTP gateway: the fetch-interception surface plus control endpoints.
//!
//! Every request outside `/_gate` is described and offered to the cache
//! worker; the worker either answers it (from cache or network per its
//! strategies) or declines, in which case the gateway fetches upstream
//! directly and uncached.

use std::sync::Arc;
use std::time::Instant;

use axum::body::Body;
use axum::extract::{DefaultBodyLimit, State};
use axum::http::{HeaderMap, HeaderName, HeaderValue, Method, StatusCode, Uri};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use tower::ServiceBuilder;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};
use uuid::Uuid;

use crate::cache::entry::{split_url, CachedResponse, RequestDescriptor, ResourceKind};
use crate::cache::store::SharedCacheStore;
use crate::config::Config;
use crate::worker::agent::{CacheWorker, Command};

/// Application state shared across handlers.
pub struct AppState {
    pub worker: Arc<CacheWorker>,
    pub store: SharedCacheStore,
    pub config: Arc<Config>,
    pub start_time: Instant,
}

/// Build the axum router: control endpoints plus the catch-all interceptor.
pub fn build_router(state: Arc<AppState>) -> Router {
    let body_limit = state.config.server.max_body_bytes;

    Router::new()
        .route("/_gate/health", get(health))
        .route("/_gate/stats", get(stats))
        .route("/_gate/control", post(control))
        .route("/_gate/sync", post(sync_trigger))
        .fallback(intercept)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CorsLayer::permissive()),
        )
        .layer(DefaultBodyLimit::max(body_limit))
        .with_state(state)
}

// ─── Request/Response Types ────────────────────────────────────────────────

/// Health check response.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub uptime_secs: u64,
    pub phase: String,
    pub cache: StatsResponse,
}

/// Cache statistics response.
#[derive(Debug, Serialize)]
pub struct StatsResponse {
    pub namespaces: Vec<NamespaceStatsResponse>,
    pub total_entries: usize,
}

#[derive(Debug, Serialize)]
pub struct NamespaceStatsResponse {
    pub name: String,
    pub entry_count: usize,
    pub bytes_used: usize,
}

/// Background-sync trigger body.
#[derive(Debug, Deserialize)]
pub struct SyncRequest {
    pub tag: String,
}

// ─── Route Handlers ────────────────────────────────────────────────────────

async fn intercept(
    State(state): State<Arc<AppState>>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let request_id = Uuid::new_v4().to_string();
    let request = describe_request(&method, &uri, &headers, body, &state.config.upstream.origin);

    info!(
        request_id,
        method = %request.method,
        url = %request.url,
        kind = ?request.kind,
        "intercepted request"
    );

    match state.worker.on_fetch(&request).await {
        Some(Ok(response)) => materialize(response),
        Some(Err(err)) => {
            warn!(
                request_id,
                url = %request.url,
                error = %err,
                "request failed with no cache fallback"
            );
            (StatusCode::BAD_GATEWAY, format!("upstream unreachable: {err}")).into_response()
        }
        // Not intercepted: talk to the network directly, nothing cached.
        None => match state.worker.fetch_direct(&request).await {
            Ok(response) => materialize(response),
            Err(err) => {
                warn!(request_id, url = %request.url, error = %err, "pass-through fetch failed");
                (StatusCode::BAD_GATEWAY, format!("upstream unreachable: {err}")).into_response()
            }
        },
    }
}

async fn health(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    let phase = state.worker.lifecycle().phase().await;
    Json(HealthResponse {
        status: "ok".to_string(),
        uptime_secs: state.start_time.elapsed().as_secs(),
        phase: phase.to_string(),
        cache: snapshot_stats(&state).await,
    })
}

async fn stats(State(state): State<Arc<AppState>>) -> Json<StatsResponse> {
    Json(snapshot_stats(&state).await)
}

async fn control(State(state): State<Arc<AppState>>, Json(command): Json<Command>) -> StatusCode {
    info!(command = ?command, "control message");
    state.worker.on_message(command).await;
    StatusCode::ACCEPTED
}

async fn sync_trigger(
    State(state): State<Arc<AppState>>,
    Json(request): Json<SyncRequest>,
) -> StatusCode {
    state.worker.on_sync(&request.tag).await;
    StatusCode::ACCEPTED
}

// ─── Helpers ───────────────────────────────────────────────────────────────

async fn snapshot_stats(state: &AppState) -> StatsResponse {
    let store = state.store.read().await;
    StatsResponse {
        namespaces: store
            .stats()
            .into_iter()
            .map(|(name, s)| NamespaceStatsResponse {
                name,
                entry_count: s.entry_count,
                bytes_used: s.bytes_used,
            })
            .collect(),
        total_entries: store.total_entries(),
    }
}

/// Build a request descriptor from the raw HTTP parts.
///
/// Absolute-form URIs keep their own origin (so the cross-origin
/// pass-through rule is observable); origin-form URIs resolve against the
/// upstream. The destination comes from `Sec-Fetch-Dest` when the client is
/// a browser, with path sniffing as the fallback.
fn describe_request(
    method: &Method,
    uri: &Uri,
    headers: &HeaderMap,
    body: Bytes,
    own_origin: &str,
) -> RequestDescriptor {
    let url = if uri.scheme().is_some() {
        uri.to_string()
    } else {
        format!("{}{}", own_origin.trim_end_matches('/'), uri)
    };

    let kind = headers
        .get("sec-fetch-dest")
        .and_then(|v| v.to_str().ok())
        .and_then(ResourceKind::from_sec_fetch_dest)
        .unwrap_or_else(|| {
            let (_, path) = split_url(&url);
            ResourceKind::from_path(&path)
        });

    let header_vec = headers
        .iter()
        .map(|(name, value)| {
            (
                name.as_str().to_string(),
                String::from_utf8_lossy(value.as_bytes()).into_owned(),
            )
        })
        .collect();

    let body = if body.is_empty() { None } else { Some(body) };

    RequestDescriptor::new(method.as_str(), &url, kind, header_vec, body)
}

/// Turn a captured response back into a wire response.
fn materialize(cached: CachedResponse) -> Response {
    let mut builder = axum::http::Response::builder().status(cached.status);
    for (name, value) in &cached.headers {
        if let (Ok(name), Ok(value)) = (
            HeaderName::try_from(name.as_str()),
            HeaderValue::try_from(value.as_str()),
        ) {
            builder = builder.header(name, value);
        }
    }
    match builder.body(Body::from(cached.body)) {
        Ok(response) => response,
        Err(_) => StatusCode::INTERNAL_SERVER_ERROR.into_response(),
    }
}
