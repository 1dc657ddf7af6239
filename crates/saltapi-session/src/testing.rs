//! In-memory transport for unit tests.

use std::{collections::VecDeque, sync::Mutex};

use async_trait::async_trait;
use bytes::Bytes;
use futures::StreamExt;
use saltapi_core::{
    ApiError, ApiRequest, ApiResponse, ByteStream, Transport, traits::classify_status,
};
use serde_json::Value;

/// Replays queued responses and records every request.
#[derive(Default)]
pub struct FakeTransport {
    responses: Mutex<VecDeque<Result<ApiResponse, ApiError>>>,
    requests: Mutex<Vec<ApiRequest>>,
}

impl FakeTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a `200` with a JSON body.
    pub fn respond_json(self, body: Value) -> Self {
        self.respond(200, serde_json::to_vec(&body).unwrap())
    }

    /// Queue a raw response; `401`/`500` are classified like the HTTP transport.
    pub fn respond(self, status: u16, body: impl Into<Bytes>) -> Self {
        let result = classify_status(status).map(|()| ApiResponse {
            status,
            body: body.into(),
        });
        self.responses.lock().unwrap().push_back(result);
        self
    }

    /// Requests seen so far.
    pub fn requests(&self) -> Vec<ApiRequest> {
        self.requests.lock().unwrap().clone()
    }

    fn next(&self, request: ApiRequest) -> Result<ApiResponse, ApiError> {
        self.requests.lock().unwrap().push(request);
        self.responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(ApiError::Connection("no response queued".to_owned())))
    }
}

#[async_trait]
impl Transport for FakeTransport {
    async fn send(&self, request: ApiRequest) -> Result<ApiResponse, ApiError> {
        self.next(request)
    }

    async fn stream(&self, request: ApiRequest) -> Result<ByteStream, ApiError> {
        let response = self.next(request)?;
        Ok(futures::stream::once(async move { Ok(response.body) }).boxed())
    }
}
