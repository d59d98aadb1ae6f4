//! Network fetching behind an injectable seam.
//!
//! Strategies and the lifecycle controller talk to the network through the
//! [`Fetcher`] trait so tests can script outcomes per URL. The production
//! implementation is a thin reqwest client.

use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;
use tracing::debug;

use crate::cache::entry::{CachedResponse, RequestDescriptor};

/// Headers that describe the connection rather than the resource; never
/// forwarded upstream and never stored.
const HOP_BY_HOP: &[&str] = &[
    "connection",
    "keep-alive",
    "proxy-authenticate",
    "proxy-authorization",
    "te",
    "trailer",
    "transfer-encoding",
    "upgrade",
    "host",
    "content-length",
];

fn is_hop_by_hop(name: &str) -> bool {
    HOP_BY_HOP.iter().any(|h| name.eq_ignore_ascii_case(h))
}

#[derive(Error, Debug)]
pub enum NetworkError {
    #[error("network fetch failed: {0}")]
    Transport(String),

    #[error("network fetch timed out after {0}s")]
    Timeout(u64),

    #[error("unsupported method: {0}")]
    Method(String),

    #[error("failed to build HTTP client: {0}")]
    Client(String),
}

/// A network fetch: resolve a request descriptor to a captured response.
///
/// Implementations must be cancel-safe; a failed fetch is a [`NetworkError`],
/// a non-ok HTTP status is a successful fetch.
#[async_trait]
pub trait Fetcher: Send + Sync {
    async fn fetch(&self, request: &RequestDescriptor) -> Result<CachedResponse, NetworkError>;
}

/// Production fetcher backed by a pooled reqwest client.
pub struct HttpFetcher {
    client: reqwest::Client,
    timeout_secs: Option<u64>,
}

impl HttpFetcher {
    /// Build a client with an optional per-request timeout.
    ///
    /// `None` relies on the transport's own timeout behavior alone.
    pub fn new(timeout_secs: Option<u64>) -> Result<Self, NetworkError> {
        let mut builder = reqwest::Client::builder().gzip(true);
        if let Some(secs) = timeout_secs {
            builder = builder.timeout(Duration::from_secs(secs));
        }
        let client = builder
            .build()
            .map_err(|e| NetworkError::Client(e.to_string()))?;
        Ok(Self {
            client,
            timeout_secs,
        })
    }
}

#[async_trait]
impl Fetcher for HttpFetcher {
    async fn fetch(&self, request: &RequestDescriptor) -> Result<CachedResponse, NetworkError> {
        let method = reqwest::Method::from_bytes(request.method.as_bytes())
            .map_err(|_| NetworkError::Method(request.method.clone()))?;

        let mut builder = self.client.request(method, &request.url);
        for (name, value) in &request.headers {
            if !is_hop_by_hop(name) {
                builder = builder.header(name, value);
            }
        }
        if let Some(body) = &request.body {
            builder = builder.body(body.clone());
        }

        let response = builder.send().await.map_err(|e| {
            if e.is_timeout() {
                NetworkError::Timeout(self.timeout_secs.unwrap_or(0))
            } else {
                NetworkError::Transport(e.to_string())
            }
        })?;

        let status = response.status().as_u16();
        let headers = response
            .headers()
            .iter()
            .filter(|(name, _)| !is_hop_by_hop(name.as_str()))
            .map(|(name, value)| {
                (
                    name.as_str().to_string(),
                    String::from_utf8_lossy(value.as_bytes()).into_owned(),
                )
            })
            .collect();

        let body = response
            .bytes()
            .await
            .map_err(|e| NetworkError::Transport(e.to_string()))?;

        debug!(url = %request.url, status, bytes = body.len(), "upstream fetch complete");

        Ok(CachedResponse {
            status,
            headers,
            body,
        })
    }
}

#[cfg(test)]
pub(crate) mod testing {
    //! Scripted fetcher shared by the unit tests of this crate.

    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    use bytes::Bytes;

    use super::*;

    enum Canned {
        Ok { status: u16, body: &'static str },
        Fail,
    }

    /// Returns canned responses per URL and counts every fetch.
    #[derive(Default)]
    pub(crate) struct ScriptedFetcher {
        canned: Mutex<HashMap<String, Canned>>,
        calls: AtomicUsize,
    }

    impl ScriptedFetcher {
        pub(crate) fn new() -> Self {
            Self::default()
        }

        pub(crate) fn ok(self, url: &str, status: u16, body: &'static str) -> Self {
            self.canned
                .lock()
                .unwrap()
                .insert(url.to_string(), Canned::Ok { status, body });
            self
        }

        pub(crate) fn fail(self, url: &str) -> Self {
            self.canned
                .lock()
                .unwrap()
                .insert(url.to_string(), Canned::Fail);
            self
        }

        pub(crate) fn call_count(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl Fetcher for ScriptedFetcher {
        async fn fetch(
            &self,
            request: &RequestDescriptor,
        ) -> Result<CachedResponse, NetworkError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            match self.canned.lock().unwrap().get(&request.url) {
                Some(Canned::Ok { status, body }) => Ok(CachedResponse {
                    status: *status,
                    headers: vec![("content-type".to_string(), "text/plain".to_string())],
                    body: Bytes::from_static(body.as_bytes()),
                }),
                Some(Canned::Fail) | None => Err(NetworkError::Transport(format!(
                    "connection refused: {}",
                    request.url
                ))),
            }
        }
    }
}
