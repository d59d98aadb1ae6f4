//! Request classification: exactly one strategy per intercepted request.
//!
//! Pure logic, no I/O. The rules form a strict priority list evaluated
//! top to bottom; the first match wins.

use crate::cache::entry::{RequestDescriptor, ResourceKind};

/// Which strategy handles a routed request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StrategyKind {
    CacheFirst,
    NetworkFirst,
}

/// Classifies requests against the application's own origin and API prefix.
#[derive(Debug, Clone)]
pub struct RequestRouter {
    own_origin: String,
    api_prefix: String,
}

impl RequestRouter {
    pub fn new(own_origin: impl Into<String>, api_prefix: impl Into<String>) -> Self {
        Self {
            own_origin: own_origin.into(),
            api_prefix: api_prefix.into(),
        }
    }

    /// `None` means the request is not intercepted at all and goes to the
    /// network untouched and uncached.
    ///
    /// 1. Foreign origin and not an API path: pass through.
    /// 2. Static assets (script/style/image/font): cache-first.
    /// 3. Documents and API paths: network-first.
    /// 4. Everything else (audio, video, workers, …): network-first.
    pub fn route(&self, request: &RequestDescriptor) -> Option<StrategyKind> {
        let api = request.path.starts_with(&self.api_prefix);

        if request.origin != self.own_origin && !api {
            return None;
        }
        if request.kind.is_static_asset() {
            return Some(StrategyKind::CacheFirst);
        }
        if request.kind == ResourceKind::Document || api {
            return Some(StrategyKind::NetworkFirst);
        }
        Some(StrategyKind::NetworkFirst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ORIGIN: &str = "http://app.local";

    fn router() -> RequestRouter {
        RequestRouter::new(ORIGIN, "/api")
    }

    fn own(path: &str, kind: ResourceKind) -> RequestDescriptor {
        RequestDescriptor::get(&format!("{ORIGIN}{path}"), kind)
    }

    #[test]
    fn test_static_assets_are_cache_first() {
        for (path, kind) in [
            ("/assets/app.js", ResourceKind::Script),
            ("/styles/main.css", ResourceKind::Style),
            ("/icon-192.png", ResourceKind::Image),
            ("/fonts/inter.woff2", ResourceKind::Font),
        ] {
            assert_eq!(
                router().route(&own(path, kind)),
                Some(StrategyKind::CacheFirst),
                "{path}"
            );
        }
    }

    #[test]
    fn test_documents_and_api_are_network_first() {
        assert_eq!(
            router().route(&own("/", ResourceKind::Document)),
            Some(StrategyKind::NetworkFirst)
        );
        assert_eq!(
            router().route(&own("/api/stores", ResourceKind::Other)),
            Some(StrategyKind::NetworkFirst)
        );
    }

    #[test]
    fn test_foreign_origin_passes_through() {
        let request =
            RequestDescriptor::get("https://cdn.example.com/lib.js", ResourceKind::Script);
        assert_eq!(router().route(&request), None);
    }

    #[test]
    fn test_foreign_origin_api_is_intercepted() {
        let request =
            RequestDescriptor::get("https://api.example.com/api/orders", ResourceKind::Other);
        assert_eq!(router().route(&request), Some(StrategyKind::NetworkFirst));
    }

    #[test]
    fn test_default_branch_is_network_first() {
        // Kinds outside the asset/document/API rules still get a strategy.
        for kind in [
            ResourceKind::Audio,
            ResourceKind::Video,
            ResourceKind::Worker,
            ResourceKind::Manifest,
            ResourceKind::Other,
        ] {
            assert_eq!(
                router().route(&own("/misc", kind)),
                Some(StrategyKind::NetworkFirst),
                "{kind:?}"
            );
        }
    }

    #[test]
    fn test_asset_rule_precedes_api_prefix() {
        // A script under /api is still a static asset by rule order: rule 2
        // fires before rule 3 ever considers the prefix.
        assert_eq!(
            router().route(&own("/api/widget.js", ResourceKind::Script)),
            Some(StrategyKind::CacheFirst)
        );
    }
}
