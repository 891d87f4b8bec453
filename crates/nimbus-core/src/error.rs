//! Error types for the Nimbus SDK

use crate::plugin::{PluginError, PluginKey};
use crate::teardown::TeardownError;
use std::fmt;
use std::time::Duration;

/// Result type alias using [`Error`]
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Main error type for the Nimbus SDK
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Missing or invalid client parameter
    #[error("Configuration error: {0}")]
    Config(String),

    /// The same plugin key was installed twice on one builder
    #[error("Plugin '{0}' is already installed")]
    DuplicatePlugin(PluginKey),

    /// A plugin rejected its configuration at install time
    #[error("Invalid configuration for plugin '{key}': {source}")]
    PluginConfig {
        /// Plugin key
        key: PluginKey,
        /// Underlying plugin error
        source: PluginError,
    },

    /// A plugin factory failed while the client was being built
    #[error("Failed to create plugin '{key}': {source}")]
    PluginCreation {
        /// Plugin key
        key: PluginKey,
        /// Underlying plugin error
        source: PluginError,
    },

    /// An installed plugin failed while serving a call
    #[error("Plugin '{key}' failed: {source}")]
    Plugin {
        /// Plugin key
        key: PluginKey,
        /// Underlying plugin error
        source: PluginError,
    },

    /// Lookup of a plugin that was never installed
    #[error("Plugin '{0}' is not installed")]
    PluginNotInstalled(PluginKey),

    /// The instance stored under a key is not of the requested type
    #[error("Plugin '{key}' is not of type {expected}")]
    PluginTypeMismatch {
        /// Plugin key
        key: PluginKey,
        /// Requested type name
        expected: &'static str,
    },

    /// The registry was read before client construction finished
    #[error("Plugin registry is not available until the client is fully built")]
    RegistryNotReady,

    /// One or more plugins failed to close
    #[error(transparent)]
    Teardown(#[from] TeardownError),

    /// The client has been closed
    #[error("Client is closed")]
    ClientClosed,

    /// The client behind a handle has been dropped
    #[error("Client has been dropped")]
    ClientDropped,

    /// Transport failure
    #[error("Transport error: {0}")]
    Transport(String),

    /// Request timeout
    #[error("Request timed out after {0:?}")]
    Timeout(Duration),

    /// Non-success response from the backend
    #[error("HTTP {status}: {body}")]
    Http {
        /// Response status
        status: http::StatusCode,
        /// Response body
        body: String,
    },

    /// Invalid URL
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Internal error (should not happen in production)
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Create a configuration error
    pub fn config(msg: impl fmt::Display) -> Self {
        Error::Config(msg.to_string())
    }

    /// Create a transport error
    pub fn transport(msg: impl fmt::Display) -> Self {
        Error::Transport(msg.to_string())
    }

    /// Create an error raised by an installed plugin
    pub fn plugin(key: PluginKey, source: PluginError) -> Self {
        Error::Plugin { key, source }
    }

    /// Whether this error reports a configuration mistake made before any
    /// resource was constructed
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            Error::Config(_) | Error::DuplicatePlugin(_) | Error::PluginConfig { .. }
        )
    }

    /// Whether this error reports a failed plugin lookup
    pub fn is_lookup(&self) -> bool {
        matches!(
            self,
            Error::PluginNotInstalled(_)
                | Error::PluginTypeMismatch { .. }
                | Error::RegistryNotReady
        )
    }

    /// Key of the plugin this error is about, if any
    pub fn plugin_key(&self) -> Option<&PluginKey> {
        match self {
            Error::DuplicatePlugin(key)
            | Error::PluginNotInstalled(key)
            | Error::PluginConfig { key, .. }
            | Error::PluginCreation { key, .. }
            | Error::Plugin { key, .. }
            | Error::PluginTypeMismatch { key, .. } => Some(key),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::PluginNotInstalled(PluginKey::from_static("storage"));
        assert_eq!(err.to_string(), "Plugin 'storage' is not installed");

        let err = Error::DuplicatePlugin(PluginKey::from_static("auth"));
        assert_eq!(err.to_string(), "Plugin 'auth' is already installed");
    }

    #[test]
    fn test_plugin_creation_error() {
        let err = Error::PluginCreation {
            key: PluginKey::from_static("realtime"),
            source: PluginError::init("socket refused"),
        };
        assert!(err.to_string().contains("realtime"));
        assert!(err.to_string().contains("socket refused"));
        assert_eq!(err.plugin_key().map(PluginKey::as_str), Some("realtime"));
    }

    #[test]
    fn test_error_classification() {
        assert!(Error::config("host is required").is_configuration());
        assert!(Error::DuplicatePlugin(PluginKey::from_static("auth")).is_configuration());
        assert!(!Error::ClientClosed.is_configuration());

        assert!(Error::PluginNotInstalled(PluginKey::from_static("auth")).is_lookup());
        assert!(Error::RegistryNotReady.is_lookup());
        assert!(!Error::transport("reset").is_lookup());
    }

    #[test]
    fn test_plugin_runtime_error() {
        let err = Error::plugin(
            PluginKey::from_static("auth"),
            PluginError::invalid_state("no active session"),
        );
        assert_eq!(err.to_string(), "Plugin 'auth' failed: Invalid state: no active session");
        assert_eq!(err.plugin_key().map(PluginKey::as_str), Some("auth"));
        assert!(!err.is_configuration());
        assert!(!err.is_lookup());
    }
}
