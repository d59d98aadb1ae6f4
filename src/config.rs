//! Runtime configuration for offline-cache-gate.
//!
//! Configuration can be loaded from a JSON file or constructed
//! programmatically. Namespace naming, the precache manifest, and all
//! upstream knobs live here.

use std::path::PathBuf;

use clap::Parser;
use serde::{Deserialize, Serialize};

/// Command-line arguments.
#[derive(Parser, Debug, Clone)]
#[command(
    name = "offline-cache-gate",
    about = "Offline-first caching gateway for PWA-style clients"
)]
pub struct Cli {
    /// Path to configuration file (JSON).
    #[arg(short, long, default_value = "config.json")]
    pub config: PathBuf,

    /// HTTP listen address (overrides the config file).
    #[arg(long)]
    pub listen: Option<String>,

    /// Upstream origin, e.g. http://127.0.0.1:3000 (overrides the config file).
    #[arg(long)]
    pub upstream: Option<String>,

    /// Enable verbose logging.
    #[arg(short, long)]
    pub verbose: bool,
}

/// Top-level configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    /// Gateway server settings.
    pub server: ServerConfig,

    /// Upstream origin settings.
    pub upstream: UpstreamConfig,

    /// Cache naming and precache manifest.
    pub cache: CacheConfig,

    /// Snapshot persistence settings.
    pub persist: PersistConfig,
}

/// HTTP server settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Listen address (e.g. "0.0.0.0:8080").
    pub listen: String,

    /// Maximum accepted request body size in bytes.
    pub max_body_bytes: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen: "0.0.0.0:8080".to_string(),
            max_body_bytes: 10 * 1024 * 1024, // 10 MB
        }
    }
}

/// Upstream origin settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct UpstreamConfig {
    /// The application's own origin, scheme://host[:port].
    pub origin: String,

    /// Path prefix always routed network-first, even cross-origin.
    pub api_prefix: String,

    /// Per-request fetch timeout in seconds. `None` leaves timeouts to the
    /// transport.
    pub fetch_timeout_secs: Option<u64>,
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            origin: "http://127.0.0.1:3000".to_string(),
            api_prefix: "/api".to_string(),
            fetch_timeout_secs: Some(30),
        }
    }
}

/// Cache naming and precache manifest.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Application name, the namespace prefix.
    pub app_name: String,

    /// Version token; must change on every deployment so activation evicts
    /// the previous build's entries.
    pub version: String,

    /// Root-relative paths precached at install.
    pub precache_manifest: Vec<String>,

    /// Root-relative path of the offline fallback document.
    pub offline_fallback: String,

    /// Background-sync tag recognized by the worker.
    pub sync_tag: String,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            app_name: "app".to_string(),
            version: "v1".to_string(),
            precache_manifest: vec![
                "/".to_string(),
                "/index.html".to_string(),
                "/manifest.json".to_string(),
                "/icon-192.png".to_string(),
                "/icon-512.png".to_string(),
            ],
            offline_fallback: "/index.html".to_string(),
            sync_tag: "sync-data".to_string(),
        }
    }
}

impl CacheConfig {
    /// Current precache namespace name.
    pub fn precache_name(&self) -> String {
        format!("{}-{}", self.app_name, self.version)
    }

    /// Current runtime namespace name.
    pub fn runtime_name(&self) -> String {
        format!("{}-runtime-{}", self.app_name, self.version)
    }
}

/// Snapshot persistence settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PersistConfig {
    /// Snapshot directory. `None` disables persistence.
    pub path: Option<PathBuf>,

    /// zstd compression level for snapshots (1-22).
    pub zstd_level: i32,
}

impl Default for PersistConfig {
    fn default() -> Self {
        Self {
            path: None,
            zstd_level: 3,
        }
    }
}

impl Config {
    /// Load configuration from a JSON file, falling back to defaults for a
    /// missing file.
    pub fn load(path: &std::path::Path) -> anyhow::Result<Self> {
        if path.exists() {
            let data = std::fs::read_to_string(path)?;
            let config: Config = serde_json::from_str(&data)?;
            Ok(config)
        } else {
            tracing::warn!("Config file not found at {:?}, using defaults", path);
            Ok(Config::default())
        }
    }

    /// Precache manifest paths joined against the upstream origin.
    pub fn manifest_urls(&self) -> Vec<String> {
        let origin = self.upstream.origin.trim_end_matches('/');
        self.cache
            .precache_manifest
            .iter()
            .map(|path| format!("{origin}{path}"))
            .collect()
    }

    /// Absolute URL of the offline fallback document.
    pub fn fallback_url(&self) -> String {
        format!(
            "{}{}",
            self.upstream.origin.trim_end_matches('/'),
            self.cache.offline_fallback
        )
    }
}
