//! Transport seam and error taxonomy.

use std::fmt;

use async_trait::async_trait;
use bytes::Bytes;
use futures::stream::BoxStream;
use serde::{Serialize, de::DeserializeOwned};
use serde_json::Value;
use thiserror::Error;

use crate::AuthStrategy;

/// Errors surfaced to callers. None are retried internally.
///
/// `DecodeFailure` and `ProtocolViolation` describe what the service sent
/// back; problems building the outgoing request are `InvalidRequest`.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("salt-api URL is not an absolute http(s) URL: {0}")]
    MalformedEndpoint(String),
    #[error("Authentication denied")]
    AuthenticationDenied,
    #[error("Server error")]
    ServerError,
    #[error("Protocol violation: {0}")]
    ProtocolViolation(String),
    #[error("Decode failure: {0}")]
    DecodeFailure(#[source] serde_json::Error),
    #[error("Connection error: {0}")]
    Connection(String),
    #[error("Invalid request: {0}")]
    InvalidRequest(String),
}

/// HTTP verbs used by the service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Post,
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Get => f.write_str("GET"),
            Self::Post => f.write_str("POST"),
        }
    }
}

/// One logical request.
#[derive(Debug, Clone)]
pub struct ApiRequest {
    pub method: Method,
    /// Path relative to the service root.
    pub path: String,
    /// JSON body, if any.
    pub body: Option<Value>,
    /// Extra headers; these win over the defaults.
    pub headers: Vec<(String, String)>,
    /// Authentication resolved for this call.
    pub auth: AuthStrategy,
}

impl ApiRequest {
    /// Create a request with no body, headers or auth.
    #[must_use]
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            body: None,
            headers: Vec::new(),
            auth: AuthStrategy::Anonymous,
        }
    }

    /// Shorthand for a GET request.
    #[must_use]
    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::Get, path)
    }

    /// Shorthand for a POST request.
    #[must_use]
    pub fn post(path: impl Into<String>) -> Self {
        Self::new(Method::Post, path)
    }

    /// Set the JSON body.
    #[must_use]
    pub fn body(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }

    /// Add a header.
    #[must_use]
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// Set the resolved authentication.
    #[must_use]
    pub fn auth(mut self, auth: AuthStrategy) -> Self {
        self.auth = auth;
        self
    }
}

/// A response that passed status classification.
///
/// The body is handed back uninterpreted; decoding is up to the caller.
#[derive(Debug, Clone)]
pub struct ApiResponse {
    pub status: u16,
    pub body: Bytes,
}

impl ApiResponse {
    /// Decode the body as JSON.
    ///
    /// # Errors
    /// Returns `DecodeFailure` if the body is not valid JSON for `T`.
    pub fn json<T: DeserializeOwned>(&self) -> Result<T, ApiError> {
        serde_json::from_slice(&self.body).map_err(ApiError::DecodeFailure)
    }

    /// Raw body bytes.
    #[must_use]
    pub fn bytes(&self) -> Bytes {
        self.body.clone()
    }
}

/// Incoming body chunks of a streaming response.
pub type ByteStream = BoxStream<'static, Result<Bytes, ApiError>>;

/// Sends requests to the service and classifies responses.
///
/// `401` maps to `AuthenticationDenied`, `500` to `ServerError`; every other
/// status is success.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Issue a request and buffer the full response.
    async fn send(&self, request: ApiRequest) -> Result<ApiResponse, ApiError>;

    /// Issue a request and return the body as a stream of chunks.
    ///
    /// Dropping the stream releases the connection.
    async fn stream(&self, request: ApiRequest) -> Result<ByteStream, ApiError>;
}

/// Encode an outgoing JSON body.
///
/// # Errors
/// Returns `InvalidRequest` if `value` cannot be represented as JSON.
pub fn encode_body<T: Serialize + ?Sized>(value: &T) -> Result<Value, ApiError> {
    serde_json::to_value(value).map_err(|e| ApiError::InvalidRequest(format!("unencodable body: {e}")))
}

/// Classify an HTTP status.
///
/// # Errors
/// Returns `AuthenticationDenied` for `401` and `ServerError` for `500`.
pub fn classify_status(status: u16) -> Result<(), ApiError> {
    match status {
        401 => Err(ApiError::AuthenticationDenied),
        500 => Err(ApiError::ServerError),
        _ => Ok(()),
    }
}
