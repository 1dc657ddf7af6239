//! Transport layer for salt-api clients.
//!
//! Provides:
//! - `HttpTransport` - reqwest-backed `Transport` with status classification
//! - Authentication strategy resolution and the negotiated-credential seam
//! - Server-push decoding (`SseDecoder`) and the `EventStream` consumer
//! - `ClientConfig` loading

pub mod auth;
pub mod config;
pub mod http;
pub mod protocol;
pub mod sse;

pub use auth::{NegotiateProvider, resolve};
pub use config::{ClientConfig, ConfigError};
pub use http::HttpTransport;
pub use protocol::ServiceRoot;
pub use sse::{EventStream, SseDecoder, SseMessage};
