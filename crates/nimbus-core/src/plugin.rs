//! Core plugin trait and types

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::borrow::{Borrow, Cow};
use std::fmt;

/// Identity of a plugin's feature area within one client (e.g. `"auth"`).
///
/// Keys are unique within a single client's registry. Descriptor singletons
/// build theirs in `const` context with [`PluginKey::from_static`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PluginKey(Cow<'static, str>);

impl PluginKey {
    /// Create a key from a static string
    pub const fn from_static(key: &'static str) -> Self {
        Self(Cow::Borrowed(key))
    }

    /// Create a key from an owned string
    pub fn new(key: impl Into<String>) -> Self {
        Self(Cow::Owned(key.into()))
    }

    /// Get the key as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Check if the key is empty
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for PluginKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for PluginKey {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl Borrow<str> for PluginKey {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl From<&'static str> for PluginKey {
    fn from(key: &'static str) -> Self {
        Self::from_static(key)
    }
}

impl From<String> for PluginKey {
    fn from(key: String) -> Self {
        Self::new(key)
    }
}

/// Core plugin trait that every installed plugin implements
///
/// Plugins are constructed by their descriptor while the client is being
/// built and live until the client is closed. Teardown is optional: the
/// default [`Plugin::close`] does nothing.
#[async_trait]
pub trait Plugin: Send + Sync + fmt::Debug + 'static {
    /// Release resources held by the plugin.
    ///
    /// Invoked at most once per instance, either when the owning client is
    /// closed or when the build that created it is rolled back. Failures are
    /// collected by the registry and never stop other plugins from closing.
    async fn close(&self) -> PluginResult<()> {
        Ok(())
    }
}

/// Plugin error type
#[derive(Debug, thiserror::Error)]
pub enum PluginError {
    /// Initialization failed
    #[error("Initialization failed: {0}")]
    InitError(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// Runtime error
    #[error("Runtime error: {0}")]
    RuntimeError(String),

    /// Invalid state
    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// Error raised by the client the plugin is attached to
    #[error("Client error: {0}")]
    ClientError(String),

    /// I/O error
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    /// Serialization error
    #[error("Serialization error: {0}")]
    SerdeError(#[from] serde_json::Error),
}

/// Result type for plugin operations
pub type PluginResult<T> = std::result::Result<T, PluginError>;

impl PluginError {
    /// Create a new initialization error
    pub fn init(msg: impl fmt::Display) -> Self {
        Self::InitError(msg.to_string())
    }

    /// Create a new configuration error
    pub fn config(msg: impl fmt::Display) -> Self {
        Self::ConfigError(msg.to_string())
    }

    /// Create a new runtime error
    pub fn runtime(msg: impl fmt::Display) -> Self {
        Self::RuntimeError(msg.to_string())
    }

    /// Create a new invalid state error
    pub fn invalid_state(msg: impl fmt::Display) -> Self {
        Self::InvalidState(msg.to_string())
    }
}

impl From<crate::Error> for PluginError {
    fn from(err: crate::Error) -> Self {
        Self::ClientError(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_plugin_key() {
        const AUTH: PluginKey = PluginKey::from_static("auth");
        assert_eq!(AUTH.as_str(), "auth");
        assert_eq!(AUTH, PluginKey::new("auth"));
        assert_eq!(AUTH.to_string(), "auth");
        assert!(!AUTH.is_empty());
        assert!(PluginKey::new("").is_empty());
    }

    #[test]
    fn test_plugin_key_lookup_by_str() {
        let mut map = HashMap::new();
        map.insert(PluginKey::new("storage"), 1);
        assert_eq!(map.get("storage"), Some(&1));
    }

    #[test]
    fn test_plugin_key_serde() {
        let key: PluginKey = serde_json::from_str("\"realtime\"").unwrap();
        assert_eq!(key.as_str(), "realtime");
        assert_eq!(serde_json::to_string(&key).unwrap(), "\"realtime\"");
    }

    #[test]
    fn test_error_creation() {
        let err = PluginError::init("test");
        assert!(matches!(err, PluginError::InitError(_)));

        let err = PluginError::config("test");
        assert!(matches!(err, PluginError::ConfigError(_)));

        let err = PluginError::runtime("test");
        assert!(matches!(err, PluginError::RuntimeError(_)));
    }

    #[test]
    fn test_error_display() {
        let err = PluginError::InitError("failed to init".to_string());
        assert_eq!(err.to_string(), "Initialization failed: failed to init");
    }

    #[test]
    fn test_from_client_error() {
        let err: PluginError = crate::Error::ClientClosed.into();
        assert!(matches!(err, PluginError::ClientError(_)));
        assert_eq!(err.to_string(), "Client error: Client is closed");
    }

    #[derive(Debug)]
    struct Noop;

    impl Plugin for Noop {}

    #[tokio::test]
    async fn test_default_close_is_noop() {
        assert!(Noop.close().await.is_ok());
    }
}
