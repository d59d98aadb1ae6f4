//! Shared test fetcher: scripted responses per URL, with call counting.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use bytes::Bytes;

use offline_cache_gate::cache::entry::{CachedResponse, RequestDescriptor};
use offline_cache_gate::net::fetcher::{Fetcher, NetworkError};

enum Canned {
    Ok { status: u16, body: &'static str },
    Fail,
}

/// Returns canned responses per URL and counts every fetch. URLs with no
/// script behave as unreachable.
#[derive(Default)]
pub struct MockFetcher {
    canned: Mutex<HashMap<String, Canned>>,
    calls: AtomicUsize,
}

impl MockFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn ok(self, url: &str, status: u16, body: &'static str) -> Self {
        self.set_ok(url, status, body);
        self
    }

    pub fn fail(self, url: &str) -> Self {
        self.set_fail(url);
        self
    }

    /// Re-script a URL mid-test (e.g. to simulate going offline).
    pub fn set_ok(&self, url: &str, status: u16, body: &'static str) {
        self.canned
            .lock()
            .unwrap()
            .insert(url.to_string(), Canned::Ok { status, body });
    }

    pub fn set_fail(&self, url: &str) {
        self.canned
            .lock()
            .unwrap()
            .insert(url.to_string(), Canned::Fail);
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Fetcher for MockFetcher {
    async fn fetch(&self, request: &RequestDescriptor) -> Result<CachedResponse, NetworkError> {
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
