//! Configuration types

use nimbus_core::{Error, Result, TeardownPolicy};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;

/// Client configuration
#[derive(Clone, Serialize, Deserialize, PartialEq)]
pub struct ClientConfig {
    /// Backend host without scheme
    pub host: String,

    /// API key sent with every request
    pub api_key: String,

    /// Use HTTPS
    #[serde(default = "default_use_https")]
    pub use_https: bool,

    /// Request timeout
    #[serde(default = "default_timeout", with = "humantime_serde")]
    pub request_timeout: Duration,

    /// Headers added to every request
    #[serde(default)]
    pub headers: BTreeMap<String, String>,

    /// What `close()` does with plugin teardown failures
    #[serde(default)]
    pub teardown: TeardownPolicy,

    /// Logging
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Per-plugin configuration sections, keyed by plugin key
    #[serde(default)]
    pub plugins: BTreeMap<String, serde_json::Value>,
}

fn default_use_https() -> bool {
    true
}

fn default_timeout() -> Duration {
    Duration::from_secs(10)
}

impl ClientConfig {
    /// Create a configuration with defaults for everything but the target
    pub fn new(host: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            api_key: api_key.into(),
            use_https: default_use_https(),
            request_timeout: default_timeout(),
            headers: BTreeMap::new(),
            teardown: TeardownPolicy::default(),
            logging: LoggingConfig::default(),
            plugins: BTreeMap::new(),
        }
    }

    /// Deserialize the configuration section of one plugin
    ///
    /// Returns `Ok(None)` when the file has no section for `key`. An empty
    /// section (`auth:` with nothing under it) reads as an empty table.
    pub fn plugin_section<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        self.plugins
            .get(key)
            .map(|value| {
                let value = match value {
                    serde_json::Value::Null => serde_json::Value::Object(Default::default()),
                    other => other.clone(),
                };
                serde_json::from_value(value).map_err(|e| {
                    Error::Config(format!("Invalid configuration for plugin '{key}': {e}"))
                })
            })
            .transpose()
    }
}

impl fmt::Debug for ClientConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientConfig")
            .field("host", &self.host)
            .field("api_key", &"<redacted>")
            .field("use_https", &self.use_https)
            .field("request_timeout", &self.request_timeout)
            .field("headers", &self.headers)
            .field("teardown", &self.teardown)
            .field("logging", &self.logging)
            .field("plugins", &self.plugins.keys().collect::<Vec<_>>())
            .finish()
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Output format
    #[serde(default)]
    pub format: LogFormat,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: LogFormat::default(),
        }
    }
}

/// Log output format
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Human-readable text
    #[default]
    Text,
    /// JSON lines
    Json,
}
