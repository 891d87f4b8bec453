//! HTTP engines executing fully prepared requests

use crate::request::TransportResponse;
use async_trait::async_trait;
use bytes::Bytes;
use nimbus_core::{Error, Result};
use std::fmt;

/// Engine that performs the actual network I/O for a transport
///
/// The transport resolves URLs, applies headers and hooks, and enforces the
/// timeout; an engine only sends the finished request and buffers the
/// response.
#[async_trait]
pub trait HttpEngine: Send + Sync + fmt::Debug {
    /// Engine name used in logs
    fn name(&self) -> &'static str;

    /// Send a request and buffer the response
    async fn execute(&self, request: http::Request<Bytes>) -> Result<TransportResponse>;

    /// Release engine resources
    ///
    /// Called once by the owning transport. The default does nothing.
    async fn close(&self) {}
}

/// Default engine backed by [`reqwest`]
#[derive(Debug, Clone)]
pub struct ReqwestEngine {
    client: reqwest::Client,
}

impl ReqwestEngine {
    /// Create an engine with reqwest defaults
    pub fn new() -> Result<Self> {
        Self::with_builder(|builder| builder)
    }

    /// Create an engine after customizing the reqwest client builder
    pub fn with_builder<F>(configure: F) -> Result<Self>
    where
        F: FnOnce(reqwest::ClientBuilder) -> reqwest::ClientBuilder,
    {
        let client = configure(reqwest::Client::builder())
            .build()
            .map_err(|e| Error::transport(format!("failed to build HTTP client: {e}")))?;

        Ok(Self { client })
    }

    /// Wrap an existing reqwest client
    pub fn from_client(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl HttpEngine for ReqwestEngine {
    fn name(&self) -> &'static str {
        "reqwest"
    }

    async fn execute(&self, request: http::Request<Bytes>) -> Result<TransportResponse> {
        let request = reqwest::Request::try_from(request).map_err(Error::transport)?;

        let response = self
            .client
            .execute(request)
            .await
            .map_err(Error::transport)?;

        let status = response.status();
        let headers = response.headers().clone();
        let body = response.bytes().await.map_err(Error::transport)?;

        Ok(TransportResponse::new(status, headers, body))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn test_reqwest_engine_execute() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/rest/v1/todos"))
            .respond_with(ResponseTemplate::new(200).set_body_string("[]"))
            .mount(&server)
            .await;

        let engine = ReqwestEngine::new().unwrap();
        let request = http::Request::builder()
            .method("GET")
            .uri(format!("{}/rest/v1/todos", server.uri()))
            .body(Bytes::new())
            .unwrap();

        let response = engine.execute(request).await.unwrap();
        assert_eq!(response.status(), http::StatusCode::OK);
        assert_eq!(response.text(), "[]");
    }

    #[tokio::test]
    async fn test_reqwest_engine_connection_error() {
        let engine = ReqwestEngine::new().unwrap();
        let request = http::Request::builder()
            .uri("http://127.0.0.1:1/unreachable")
            .body(Bytes::new())
            .unwrap();

        let result = engine.execute(request).await;
        assert!(matches!(result, Err(Error::Transport(_))));
    }

    #[test]
    fn test_with_builder() {
        let engine =
            ReqwestEngine::with_builder(|builder| builder.user_agent("nimbus-test/0.1")).unwrap();
        assert_eq!(engine.name(), "reqwest");
    }
}
