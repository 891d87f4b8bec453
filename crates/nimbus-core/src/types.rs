//! Connection parameters for the hosted backend

use crate::error::{Error, Result};
use std::fmt;
use std::time::Duration;
use url::Url;

/// Target parameters shared by the transport and every plugin
///
/// The host is given without a scheme (`"abc.nimbus.dev"` or
/// `"localhost:54321"`); [`ConnectionParams::use_https`] decides the scheme.
#[derive(Clone, PartialEq, Eq)]
pub struct ConnectionParams {
    host: String,
    api_key: String,
    use_https: bool,
    request_timeout: Duration,
}

impl ConnectionParams {
    /// Request timeout used when none is configured
    pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

    /// Create connection parameters, validating host and API key
    pub fn new(host: impl Into<String>, api_key: impl Into<String>) -> Result<Self> {
        let host = host.into().trim().trim_end_matches('/').to_string();
        let api_key = api_key.into();

        if host.is_empty() {
            return Err(Error::config("host is required"));
        }

        if host.contains("://") {
            return Err(Error::config(format!(
                "host '{host}' must not include a scheme; use `use_https` instead"
            )));
        }

        if api_key.trim().is_empty() {
            return Err(Error::config("api key is required"));
        }

        Ok(Self {
            host,
            api_key,
            use_https: true,
            request_timeout: Self::DEFAULT_REQUEST_TIMEOUT,
        })
    }

    /// Set whether to use HTTPS
    pub fn with_https(mut self, use_https: bool) -> Self {
        self.use_https = use_https;
        self
    }

    /// Set the request timeout
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Backend host (no scheme)
    pub fn host(&self) -> &str {
        &self.host
    }

    /// API key sent with every request
    pub fn api_key(&self) -> &str {
        &self.api_key
    }

    /// Whether requests use HTTPS
    pub fn use_https(&self) -> bool {
        self.use_https
    }

    /// Request timeout
    pub fn request_timeout(&self) -> Duration {
        self.request_timeout
    }

    /// URL scheme derived from [`ConnectionParams::use_https`]
    pub fn scheme(&self) -> &'static str {
        if self.use_https {
            "https"
        } else {
            "http"
        }
    }

    /// Base URL of the backend, always ending in `/`
    pub fn base_url(&self) -> Result<Url> {
        Ok(Url::parse(&format!("{}://{}/", self.scheme(), self.host))?)
    }
}

impl fmt::Debug for ConnectionParams {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionParams")
            .field("host", &self.host)
            .field("api_key", &"<redacted>")
            .field("use_https", &self.use_https)
            .field("request_timeout", &self.request_timeout)
            .finish()
    }
}
