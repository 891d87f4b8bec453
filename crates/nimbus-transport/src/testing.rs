//! Mock engine for testing code that talks through a transport

use crate::engine::HttpEngine;
use crate::request::TransportResponse;
use async_trait::async_trait;
use bytes::Bytes;
use http::{HeaderMap, StatusCode};
use nimbus_core::Result;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// Request captured by [`MockEngine`]
#[derive(Debug, Clone)]
pub struct RecordedRequest {
    /// HTTP method
    pub method: http::Method,
    /// Full request URI
    pub uri: String,
    /// Request headers
    pub headers: HeaderMap,
    /// Request body
    pub body: Bytes,
}

/// Engine that records requests and replays canned responses
///
/// Responses queued with [`MockEngine::respond_with`] are returned in order;
/// once the queue is empty every request gets `200 {}`.
#[derive(Debug, Clone, Default)]
pub struct MockEngine {
    requests: Arc<Mutex<Vec<RecordedRequest>>>,
    responses: Arc<Mutex<VecDeque<TransportResponse>>>,
    close_calls: Arc<AtomicUsize>,
}

impl MockEngine {
    /// Create a new mock engine
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a response
    pub fn respond_with(&self, status: StatusCode, body: impl Into<Bytes>) -> &Self {
        self.responses
            .lock()
            .push_back(TransportResponse::new(status, HeaderMap::new(), body));
        self
    }

    /// Requests received so far
    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.requests.lock().clone()
    }

    /// Most recent request, if any
    pub fn last_request(&self) -> Option<RecordedRequest> {
        self.requests.lock().last().cloned()
    }

    /// Number of close calls
    pub fn close_count(&self) -> usize {
        self.close_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl HttpEngine for MockEngine {
    fn name(&self) -> &'static str {
        "mock"
    }

    async fn execute(&self, request: http::Request<Bytes>) -> Result<TransportResponse> {
        let (parts, body) = request.into_parts();
        self.requests.lock().push(RecordedRequest {
            method: parts.method,
            uri: parts.uri.to_string(),
            headers: parts.headers,
            body,
        });

        let response = self.responses.lock().pop_front();
        Ok(response.unwrap_or_else(|| TransportResponse::new(StatusCode::OK, HeaderMap::new(), "{}")))
    }

    async fn close(&self) {
        self.close_calls.fetch_add(1, Ordering::SeqCst);
    }
}
