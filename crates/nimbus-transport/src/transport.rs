//! Client-owned HTTP transport

use crate::engine::HttpEngine;
use crate::request::{TransportRequest, TransportResponse};
use bytes::Bytes;
use http::header::AUTHORIZATION;
use http::{HeaderMap, HeaderName, HeaderValue};
use nimbus_core::{ConnectionParams, Error, Result};
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use url::Url;

/// Callback run on every prepared request, after all headers are applied
pub type RequestHook = Arc<dyn Fn(&mut http::Request<Bytes>) + Send + Sync>;

/// Header carrying the API key on every request
pub const API_KEY_HEADER: &str = "apikey";

/// Transport settings accumulated by the client builder
#[derive(Clone)]
pub struct TransportConfig {
    /// Base URL every request path is resolved against
    pub base_url: Url,

    /// API key sent as `apikey` and default bearer token
    pub api_key: String,

    /// Per-request timeout
    pub timeout: Duration,

    /// Headers added to every request (request headers win)
    pub default_headers: HeaderMap,

    /// Hooks applied in order to every prepared request
    pub hooks: Vec<RequestHook>,
}

impl TransportConfig {
    /// Create transport settings from connection parameters
    pub fn from_params(params: &ConnectionParams) -> Result<Self> {
        Ok(Self {
            base_url: params.base_url()?,
            api_key: params.api_key().to_string(),
            timeout: params.request_timeout(),
            default_headers: HeaderMap::new(),
            hooks: Vec::new(),
        })
    }
}

impl fmt::Debug for TransportConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TransportConfig")
            .field("base_url", &self.base_url.as_str())
            .field("api_key", &"<redacted>")
            .field("timeout", &self.timeout)
            .field("default_headers", &self.default_headers.len())
            .field("hooks", &self.hooks.len())
            .finish()
    }
}

/// HTTP transport shared by a client and all of its plugins
pub struct HttpTransport {
    config: TransportConfig,
    engine: Arc<dyn HttpEngine>,
    closed: AtomicBool,
}

impl HttpTransport {
    /// Create a transport over the given engine
    pub fn new(config: TransportConfig, engine: Arc<dyn HttpEngine>) -> Self {
        Self {
            config,
            engine,
            closed: AtomicBool::new(false),
        }
    }

    /// Base URL of the backend
    pub fn base_url(&self) -> &Url {
        &self.config.base_url
    }

    /// Per-request timeout
    pub fn timeout(&self) -> Duration {
        self.config.timeout
    }

    /// Name of the underlying engine
    pub fn engine_name(&self) -> &'static str {
        self.engine.name()
    }

    /// Check if the transport has been closed
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Resolve a path against the base URL
    pub fn url(&self, path: &str) -> Result<Url> {
        Ok(self.config.base_url.join(path.trim_start_matches('/'))?)
    }

    /// Execute a request
    ///
    /// Fails with [`Error::ClientClosed`] once the transport is closed and
    /// with [`Error::Timeout`] when the engine does not answer in time.
    pub async fn execute(&self, request: TransportRequest) -> Result<TransportResponse> {
        if self.is_closed() {
            return Err(Error::ClientClosed);
        }

        let request = self.prepare(request)?;

        tracing::debug!(
            method = %request.method(),
            uri = %request.uri(),
            engine = self.engine.name(),
            "Sending request"
        );

        let timeout = tokio::time::timeout(self.config.timeout, self.engine.execute(request));

        match timeout.await {
            Ok(result) => result,
            Err(_) => Err(Error::Timeout(self.config.timeout)),
        }
    }

    /// Build the outgoing request: URL, auth headers, default headers,
    /// request headers, then hooks
    pub fn prepare(&self, request: TransportRequest) -> Result<http::Request<Bytes>> {
        let mut url = self.url(request.path())?;
        if !request.query_pairs().is_empty() {
            let mut pairs = url.query_pairs_mut();
            for (key, value) in request.query_pairs() {
                pairs.append_pair(key, value);
            }
        }

        let mut headers = HeaderMap::new();

        let mut api_key = HeaderValue::from_str(&self.config.api_key)
            .map_err(|e| Error::config(format!("api key is not a valid header value: {e}")))?;
        api_key.set_sensitive(true);
        headers.insert(HeaderName::from_static(API_KEY_HEADER), api_key);

        let mut bearer = HeaderValue::from_str(&format!("Bearer {}", self.config.api_key))
            .map_err(|e| Error::config(format!("api key is not a valid header value: {e}")))?;
        bearer.set_sensitive(true);
        headers.insert(AUTHORIZATION, bearer);

        for (name, value) in &self.config.default_headers {
            headers.insert(name.clone(), value.clone());
        }
        for (name, value) in request.headers() {
            headers.insert(name.clone(), value.clone());
        }

        let mut prepared = http::Request::builder()
            .method(request.method().clone())
            .uri(url.as_str())
            .body(request.body_bytes().clone())
            .map_err(|e| Error::transport(format!("failed to build request: {e}")))?;
        *prepared.headers_mut() = headers;

        for hook in &self.config.hooks {
            hook(&mut prepared);
        }

        Ok(prepared)
    }

    /// Close the transport
    ///
    /// Idempotent: returns `true` only for the call that actually closed it.
    pub async fn close(&self) -> bool {
        if self.closed.swap(true, Ordering::AcqRel) {
            return false;
        }

        self.engine.close().await;
        tracing::debug!(engine = self.engine.name(), "Transport closed");
        true
    }
}

impl fmt::Debug for HttpTransport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HttpTransport")
            .field("config", &self.config)
            .field("engine", &self.engine.name())
            .field("closed", &self.is_closed())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::ReqwestEngine;
    use crate::testing::MockEngine;
    use wiremock::matchers::{header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn config_for(base: &str) -> TransportConfig {
        TransportConfig {
            base_url: Url::parse(&format!("{base}/")).unwrap(),
            api_key: "anon-key".to_string(),
            timeout: Duration::from_secs(5),
            default_headers: HeaderMap::new(),
            hooks: Vec::new(),
        }
    }

    #[test]
    fn test_prepare_applies_headers_in_order() {
        let mut config = config_for("https://abc.nimbus.dev");
        config
            .default_headers
            .insert("x-client-info", HeaderValue::from_static("nimbus-rs/0.1"));
        config
            .default_headers
            .insert("x-region", HeaderValue::from_static("us-east-1"));
        config.hooks.push(Arc::new(|req: &mut http::Request<Bytes>| {
            req.headers_mut()
                .insert("x-hooked", HeaderValue::from_static("yes"));
        }));

        let transport = HttpTransport::new(config, Arc::new(MockEngine::new()));
        let request = TransportRequest::get("/rest/v1/todos")
            .query("select", "id")
            .try_header("x-region", "eu-west-1")
            .unwrap();

        let prepared = transport.prepare(request).unwrap();
        assert_eq!(
            prepared.uri().to_string(),
            "https://abc.nimbus.dev/rest/v1/todos?select=id"
        );
        assert_eq!(prepared.headers()[API_KEY_HEADER], "anon-key");
        assert_eq!(prepared.headers()[AUTHORIZATION], "Bearer anon-key");
        assert_eq!(prepared.headers()["x-client-info"], "nimbus-rs/0.1");
        assert_eq!(prepared.headers()["x-region"], "eu-west-1");
        assert_eq!(prepared.headers()["x-hooked"], "yes");
    }

    #[tokio::test]
    async fn test_execute_over_reqwest() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/rest/v1/todos"))
            .and(query_param("select", "*"))
            .and(header(API_KEY_HEADER, "anon-key"))
            .respond_with(ResponseTemplate::new(200).set_body_string(r#"[{"id":1}]"#))
            .expect(1)
            .mount(&server)
            .await;

        let transport = HttpTransport::new(
            config_for(&server.uri()),
            Arc::new(ReqwestEngine::new().unwrap()),
        );

        let response = transport
            .execute(TransportRequest::get("rest/v1/todos").query("select", "*"))
            .await
            .unwrap();

        let rows: serde_json::Value = response.json().unwrap();
        assert_eq!(rows[0]["id"], 1);
    }

    #[tokio::test]
    async fn test_execute_timeout() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(2)))
            .mount(&server)
            .await;

        let mut config = config_for(&server.uri());
        config.timeout = Duration::from_millis(100);
        let transport = HttpTransport::new(config, Arc::new(ReqwestEngine::new().unwrap()));

        let result = transport.execute(TransportRequest::get("slow")).await;
        assert!(matches!(result, Err(Error::Timeout(_))));
    }

    #[tokio::test]
    async fn test_close_is_idempotent() {
        let engine = Arc::new(MockEngine::new());
        let transport = HttpTransport::new(config_for("https://abc.nimbus.dev"), engine.clone());

        assert!(transport.close().await);
        assert!(!transport.close().await);
        assert!(transport.is_closed());
        assert_eq!(engine.close_count(), 1);

        let result = transport.execute(TransportRequest::get("rest/v1")).await;
        assert!(matches!(result, Err(Error::ClientClosed)));
        assert!(engine.requests().is_empty());
    }
}
