//! HTTP surface of the gateway.
//!
//! - [`gateway`]: axum router, interception fallback, `/_gate/*` endpoints

pub mod gateway;
