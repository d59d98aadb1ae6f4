//! offline-cache-gate: offline-first caching gateway.
//!
//! Fronts a web application's origin server and intercepts every client
//! request, answering from versioned cache namespaces:
//!   precache (install-time asset manifest) → cache-first for static assets
//!   runtime  (populated opportunistically) → network-first for documents/APIs
//!
//! A version transition runs install → activate → claim once at startup;
//! thereafter the router picks exactly one strategy per request for the
//! process lifetime. Exposes the proxied application surface plus `/_gate/*`
//! control endpoints.

pub mod cache;
pub mod config;
pub mod net;
pub mod server;
pub mod worker;
