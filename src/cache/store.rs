//! Namespaced cache store.
//!
//! The store is the process-wide set of cache namespaces. Each namespace maps
//! request identities to captured responses and keeps its own usage
//! accounting. Namespaces are versioned by name; the lifecycle controller
//! decides which names are current and which are stale.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::RwLock;
use tracing::debug;

use crate::cache::entry::{CacheKey, CachedResponse};

/// Per-namespace usage statistics.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NamespaceStats {
    /// Number of entries in this namespace.
    pub entry_count: usize,
    /// Total body bytes stored in this namespace.
    pub bytes_used: usize,
}

/// One named cache: request identity → captured response.
#[derive(Debug, Default)]
struct Namespace {
    entries: HashMap<CacheKey, CachedResponse>,
    bytes_used: usize,
}

impl Namespace {
    fn insert(&mut self, key: CacheKey, response: CachedResponse) {
        if let Some(old) = self.entries.remove(&key) {
            self.bytes_used = self.bytes_used.saturating_sub(old.body_len());
        }
        self.bytes_used += response.body_len();
        self.entries.insert(key, response);
    }

    fn remove(&mut self, key: &CacheKey) -> bool {
        match self.entries.remove(key) {
            Some(old) => {
                self.bytes_used = self.bytes_used.saturating_sub(old.body_len());
                true
            }
            None => false,
        }
    }

    fn stats(&self) -> NamespaceStats {
        NamespaceStats {
            entry_count: self.entries.len(),
            bytes_used: self.bytes_used,
        }
    }
}

/// The process-wide set of cache namespaces.
pub struct CacheStore {
    namespaces: HashMap<String, Namespace>,
}

impl CacheStore {
    pub fn new() -> Self {
        Self {
            namespaces: HashMap::new(),
        }
    }

    /// Open a namespace, creating it if absent.
    pub fn open(&mut self, name: &str) {
        self.namespaces.entry(name.to_string()).or_default();
    }

    /// Whether a namespace with this name exists.
    pub fn has(&self, name: &str) -> bool {
        self.namespaces.contains_key(name)
    }

    /// Names of all existing namespaces.
    pub fn names(&self) -> Vec<String> {
        self.namespaces.keys().cloned().collect()
    }

    /// Delete a whole namespace. Returns whether it existed.
    pub fn delete(&mut self, name: &str) -> bool {
        let existed = self.namespaces.remove(name).is_some();
        if existed {
            debug!(namespace = name, "deleted cache namespace");
        }
        existed
    }

    /// Store a response under `key`, opening the namespace if needed.
    /// An existing entry for the same key is overwritten (last write wins).
    pub fn insert(&mut self, namespace: &str, key: CacheKey, response: CachedResponse) {
        self.namespaces
            .entry(namespace.to_string())
            .or_default()
            .insert(key, response);
    }

    /// Look up an entry. A miss is a normal outcome, not an error.
    pub fn lookup(&self, namespace: &str, key: &CacheKey) -> Option<CachedResponse> {
        self.namespaces
            .get(namespace)?
            .entries
            .get(key)
            .cloned()
    }

    /// Remove a single entry. Returns whether it existed.
    pub fn remove_entry(&mut self, namespace: &str, key: &CacheKey) -> bool {
        match self.namespaces.get_mut(namespace) {
            Some(ns) => ns.remove(key),
            None => false,
        }
    }

    /// Delete every namespace, regardless of name or version.
    /// Returns the number of namespaces deleted.
    pub fn clear_all(&mut self) -> usize {
        let count = self.namespaces.len();
        self.namespaces.clear();
        count
    }

    /// All entries of a namespace, cloned out for snapshotting.
    pub fn entries(&self, namespace: &str) -> Vec<(CacheKey, CachedResponse)> {
        self.namespaces
            .get(namespace)
            .map(|ns| {
                ns.entries
                    .iter()
                    .map(|(k, v)| (k.clone(), v.clone()))
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Per-namespace statistics for monitoring.
    pub fn stats(&self) -> Vec<(String, NamespaceStats)> {
        let mut stats: Vec<_> = self
            .namespaces
            .iter()
            .map(|(name, ns)| (name.clone(), ns.stats()))
            .collect();
        stats.sort_by(|a, b| a.0.cmp(&b.0));
        stats
    }

    /// Total number of entries across all namespaces.
    pub fn total_entries(&self) -> usize {
        self.namespaces.values().map(|ns| ns.entries.len()).sum()
    }

    /// Wrap this store for shared async access.
    pub fn into_shared(self) -> SharedCacheStore {
        Arc::new(RwLock::new(self))
    }
}

impl Default for CacheStore {
    fn default() -> Self {
        Self::new()
    }
}

/// Thread-safe handle to the store. Individual read/write operations are
/// serialized by the lock; strategies do not coordinate beyond that.
pub type SharedCacheStore = Arc<RwLock<CacheStore>>;

/// Create a new empty shared store.
pub fn new_shared_store() -> SharedCacheStore {
    CacheStore::new().into_shared()
}
