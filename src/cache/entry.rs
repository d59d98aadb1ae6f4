//! Cache entry types: request identity, captured responses, resource kinds.
//!
//! A cache entry maps a request identity (method + URL) to a captured
//! response. Entries are the unit of storage inside a namespace and the
//! currency every strategy deals in.

use bytes::Bytes;
use serde::{Deserialize, Serialize};

/// The destination category of an intercepted request.
///
/// Mirrors the browser's request-destination taxonomy, collapsed to the
/// categories the router actually distinguishes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ResourceKind {
    /// Top-level HTML document.
    Document,
    /// JavaScript.
    Script,
    /// Stylesheet.
    Style,
    /// Image of any format.
    Image,
    /// Web font.
    Font,
    /// Audio resource.
    Audio,
    /// Video resource.
    Video,
    /// Worker script (dedicated, shared, or service worker).
    Worker,
    /// Web-app manifest.
    Manifest,
    /// Anything else (fetch/XHR, beacons, unknown).
    Other,
}

impl ResourceKind {
    /// Map a `Sec-Fetch-Dest` header value to a kind, if recognized.
    pub fn from_sec_fetch_dest(value: &str) -> Option<Self> {
        match value {
            "document" | "frame" | "iframe" => Some(Self::Document),
            "script" => Some(Self::Script),
            "style" => Some(Self::Style),
            "image" => Some(Self::Image),
            "font" => Some(Self::Font),
            "audio" => Some(Self::Audio),
            "video" => Some(Self::Video),
            "worker" | "sharedworker" | "serviceworker" => Some(Self::Worker),
            "manifest" => Some(Self::Manifest),
            "empty" => Some(Self::Other),
            _ => None,
        }
    }

    /// Classify a request by its URL path when no destination header exists.
    ///
    /// Clients that are not browsers (curl, native apps) send no
    /// `Sec-Fetch-Dest`; extension sniffing keeps routing sane for them.
    pub fn from_path(path: &str) -> Self {
        let path = path.split(['?', '#']).next().unwrap_or(path);
        if path == "/" || path.ends_with('/') {
            return Self::Document;
        }
        let file = path.rsplit('/').next().unwrap_or(path);
        let ext = match file.rsplit_once('.') {
            Some((_, ext)) => ext.to_ascii_lowercase(),
            None => return Self::Document,
        };
        match ext.as_str() {
            "html" | "htm" => Self::Document,
            "js" | "mjs" => Self::Script,
            "css" => Self::Style,
            "png" | "jpg" | "jpeg" | "gif" | "webp" | "svg" | "ico" | "avif" => Self::Image,
            "woff" | "woff2" | "ttf" | "otf" | "eot" => Self::Font,
            "mp3" | "wav" | "oga" | "ogg" => Self::Audio,
            "mp4" | "webm" | "ogv" => Self::Video,
            "webmanifest" => Self::Manifest,
            _ => Self::Other,
        }
    }

    /// Whether this kind is a static asset served cache-first.
    pub fn is_static_asset(&self) -> bool {
        matches!(self, Self::Script | Self::Style | Self::Image | Self::Font)
    }
}

/// Split an absolute URL into `(origin, path)`.
///
/// `origin` is `scheme://host[:port]`; `path` starts with `/` and keeps the
/// query string. A URL without a path component yields `/`.
pub fn split_url(url: &str) -> (String, String) {
    match url.find("://") {
        Some(scheme_end) => {
            let rest = &url[scheme_end + 3..];
            match rest.find('/') {
                Some(slash) => (
                    url[..scheme_end + 3 + slash].to_string(),
                    rest[slash..].to_string(),
                ),
                None => (url.to_string(), "/".to_string()),
            }
        }
        // Relative URL: no origin to speak of.
        None => (String::new(), url.to_string()),
    }
}

/// Request identity: the key an entry is stored and matched under.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CacheKey {
    /// HTTP method, uppercase.
    pub method: String,
    /// Absolute URL, query string included.
    pub url: String,
}

impl CacheKey {
    /// Key for a GET of the given URL.
    pub fn get(url: impl Into<String>) -> Self {
        Self {
            method: "GET".to_string(),
            url: url.into(),
        }
    }
}

impl std::fmt::Display for CacheKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {}", self.method, self.url)
    }
}

/// A captured response: status, headers, body.
///
/// Hop-by-hop headers are stripped at capture time, so a stored response can
/// be replayed to any client as-is.
#[derive(Debug, Clone)]
pub struct CachedResponse {
    /// HTTP status code.
    pub status: u16,
    /// Response headers in arrival order.
    pub headers: Vec<(String, String)>,
    /// Response body.
    pub body: Bytes,
}

impl CachedResponse {
    /// Whether the status is 2xx. Only ok responses are ever cached.
    pub fn is_ok(&self) -> bool {
        (200..=299).contains(&self.status)
    }

    /// Body size in bytes.
    pub fn body_len(&self) -> usize {
        self.body.len()
    }

    /// First header with the given name, case-insensitive.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

/// Everything the router and strategies need to know about one request.
#[derive(Debug, Clone)]
pub struct RequestDescriptor {
    /// HTTP method, uppercase.
    pub method: String,
    /// Absolute URL, query string included.
    pub url: String,
    /// `scheme://host[:port]` part of the URL.
    pub origin: String,
    /// Path part of the URL, leading `/`, query included.
    pub path: String,
    /// Destination category.
    pub kind: ResourceKind,
    /// Request headers to forward upstream.
    pub headers: Vec<(String, String)>,
    /// Request body, if any.
    pub body: Option<Bytes>,
}

impl RequestDescriptor {
    pub fn new(
        method: &str,
        url: &str,
        kind: ResourceKind,
        headers: Vec<(String, String)>,
        body: Option<Bytes>,
    ) -> Self {
        let (origin, path) = split_url(url);
        Self {
            method: method.to_ascii_uppercase(),
            url: url.to_string(),
            origin,
            path,
            kind,
            headers,
            body,
        }
    }

    /// A bare GET with an explicit kind.
    pub fn get(url: &str, kind: ResourceKind) -> Self {
        Self::new("GET", url, kind, Vec::new(), None)
    }

    /// A bare GET, kind sniffed from the URL path.
    pub fn from_url(url: &str) -> Self {
        let (_, path) = split_url(url);
        Self::get(url, ResourceKind::from_path(&path))
    }

    /// The identity this request is cached and matched under.
    pub fn cache_key(&self) -> CacheKey {
        CacheKey {
            method: self.method.clone(),
            url: self.url.clone(),
        }
    }

    pub fn is_document(&self) -> bool {
        self.kind == ResourceKind::Document
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_url() {
        assert_eq!(
            split_url("http://app.local/assets/main.js"),
            ("http://app.local".to_string(), "/assets/main.js".to_string())
        );
        assert_eq!(
            split_url("https://api.other.com:8443/api/v1?x=1"),
            (
                "https://api.other.com:8443".to_string(),
                "/api/v1?x=1".to_string()
            )
        );
        assert_eq!(
            split_url("http://app.local"),
            ("http://app.local".to_string(), "/".to_string())
        );
    }

    #[test]
    fn test_kind_from_sec_fetch_dest() {
        assert_eq!(
            ResourceKind::from_sec_fetch_dest("document"),
            Some(ResourceKind::Document)
        );
        assert_eq!(
            ResourceKind::from_sec_fetch_dest("script"),
            Some(ResourceKind::Script)
        );
        assert_eq!(
            ResourceKind::from_sec_fetch_dest("empty"),
            Some(ResourceKind::Other)
        );
        assert_eq!(ResourceKind::from_sec_fetch_dest("made-up"), None);
    }

    #[test]
    fn test_kind_from_path() {
        assert_eq!(ResourceKind::from_path("/"), ResourceKind::Document);
        assert_eq!(ResourceKind::from_path("/index.html"), ResourceKind::Document);
        assert_eq!(ResourceKind::from_path("/assets/app.js"), ResourceKind::Script);
        assert_eq!(
            ResourceKind::from_path("/styles/main.css?v=2"),
            ResourceKind::Style
        );
        assert_eq!(ResourceKind::from_path("/icon-192.png"), ResourceKind::Image);
        assert_eq!(
            ResourceKind::from_path("/fonts/inter.woff2"),
            ResourceKind::Font
        );
        assert_eq!(ResourceKind::from_path("/api/stores"), ResourceKind::Document);
        assert_eq!(ResourceKind::from_path("/data.json"), ResourceKind::Other);
    }

    #[test]
    fn test_static_asset_kinds() {
        assert!(ResourceKind::Script.is_static_asset());
        assert!(ResourceKind::Font.is_static_asset());
        assert!(!ResourceKind::Document.is_static_asset());
        assert!(!ResourceKind::Other.is_static_asset());
    }

    #[test]
    fn test_descriptor_key() {
        let req = RequestDescriptor::get("http://app.local/api/stores?id=2", ResourceKind::Other);
        assert_eq!(req.origin, "http://app.local");
        assert_eq!(req.path, "/api/stores?id=2");
        assert_eq!(req.cache_key().to_string(), "GET http://app.local/api/stores?id=2");
    }

    #[test]
    fn test_ok_gate() {
        let ok = CachedResponse {
            status: 204,
            headers: vec![],
            body: Bytes::new(),
        };
        let not_found = CachedResponse {
            status: 404,
            headers: vec![],
            body: Bytes::new(),
        };
        assert!(ok.is_ok());
        assert!(!not_found.is_ok());
    }
}
