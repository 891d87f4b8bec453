//! # Nimbus Transport
//!
//! HTTP transport owned by a Nimbus client and shared with its plugins:
//! - Base URL and API key applied to every request
//! - Default headers and request hooks
//! - Per-request timeout
//! - Pluggable engine ([`HttpEngine`]), [`ReqwestEngine`] by default
//! - Idempotent close

#![forbid(unsafe_code)]
#![warn(
    missing_docs,
    missing_debug_implementations,
    rust_2018_idioms,
    unreachable_pub
)]

pub mod engine;
pub mod request;
pub mod transport;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use engine::{HttpEngine, ReqwestEngine};
pub use request::{TransportRequest, TransportResponse};
pub use transport::{HttpTransport, RequestHook, TransportConfig, API_KEY_HEADER};

// Re-export commonly used HTTP types
pub use http::{HeaderMap, HeaderName, HeaderValue, Method, StatusCode};

/// Re-export commonly used types
pub mod prelude {
    pub use crate::engine::{HttpEngine, ReqwestEngine};
    pub use crate::request::{TransportRequest, TransportResponse};
    pub use crate::transport::{HttpTransport, RequestHook, TransportConfig};
}
