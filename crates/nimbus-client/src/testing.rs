//! Recording plugins for testing client lifecycles
//!
//! [`RecordingDescriptor`] installs a plugin under any key and reports every
//! creation and teardown to a shared [`LifecycleLog`]. Creation and close can
//! be made to fail to exercise rollback and teardown aggregation.

use crate::client::ClientHandle;
use crate::plugin::PluginDescriptor;
use async_trait::async_trait;
use nimbus_core::{Error, Plugin, PluginError, PluginKey, PluginResult};
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;

pub use nimbus_transport::testing::{MockEngine, RecordedRequest};

/// Shared record of plugin creations and teardowns
#[derive(Debug, Clone, Default)]
pub struct LifecycleLog {
    created: Arc<Mutex<Vec<PluginKey>>>,
    closed: Arc<Mutex<Vec<PluginKey>>>,
}

impl LifecycleLog {
    /// Create an empty log
    pub fn new() -> Self {
        Self::default()
    }

    /// Keys of created plugins, in creation order
    pub fn created(&self) -> Vec<String> {
        self.created.lock().iter().map(|k| k.to_string()).collect()
    }

    /// Keys of closed plugins, in teardown order
    pub fn closed(&self) -> Vec<String> {
        self.closed.lock().iter().map(|k| k.to_string()).collect()
    }

    /// Number of times the plugin under `key` was closed
    pub fn close_count(&self, key: &str) -> usize {
        self.closed.lock().iter().filter(|k| k.as_str() == key).count()
    }

    fn record_created(&self, key: &PluginKey) {
        self.created.lock().push(key.clone());
    }

    fn record_closed(&self, key: &PluginKey) {
        self.closed.lock().push(key.clone());
    }
}

/// Configuration of a recording plugin
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecordingConfig {
    /// Optional timeout, rejected when zero
    pub timeout: Option<Duration>,
    /// Free-form label
    pub label: String,
}

/// Descriptor installing a [`RecordingPlugin`]
#[derive(Debug, Clone)]
pub struct RecordingDescriptor {
    key: PluginKey,
    events: LifecycleLog,
    fail_create: bool,
    fail_close: bool,
}

impl RecordingDescriptor {
    /// Create a descriptor reporting to `events`
    pub fn new(key: impl Into<PluginKey>, events: &LifecycleLog) -> Self {
        Self {
            key: key.into(),
            events: events.clone(),
            fail_create: false,
            fail_close: false,
        }
    }

    /// Make the factory fail
    pub fn failing_create(mut self) -> Self {
        self.fail_create = true;
        self
    }

    /// Make the plugin's close hook fail
    pub fn failing_close(mut self) -> Self {
        self.fail_close = true;
        self
    }
}

impl PluginDescriptor for RecordingDescriptor {
    type Config = RecordingConfig;
    type Plugin = RecordingPlugin;

    fn key(&self) -> PluginKey {
        self.key.clone()
    }

    fn validate_config(&self, config: &RecordingConfig) -> PluginResult<()> {
        if config.timeout == Some(Duration::ZERO) {
            return Err(PluginError::config("timeout must be > 0"));
        }
        Ok(())
    }

    fn create(&self, client: ClientHandle, config: RecordingConfig) -> PluginResult<RecordingPlugin> {
        if self.fail_create {
            return Err(PluginError::init(format!("plugin '{}' refused to start", self.key)));
        }

        let registry_not_ready_at_create = client
            .upgrade()
            .map(|c| matches!(c.plugins(), Err(Error::RegistryNotReady)))
            .unwrap_or(false);

        self.events.record_created(&self.key);

        Ok(RecordingPlugin {
            key: self.key.clone(),
            config,
            client,
            events: self.events.clone(),
            fail_close: self.fail_close,
            registry_not_ready_at_create,
        })
    }
}

/// Plugin created by [`RecordingDescriptor`]
#[derive(Debug)]
pub struct RecordingPlugin {
    key: PluginKey,
    config: RecordingConfig,
    client: ClientHandle,
    events: LifecycleLog,
    fail_close: bool,
    registry_not_ready_at_create: bool,
}

impl RecordingPlugin {
    /// Key the plugin was installed under
    pub fn key(&self) -> &PluginKey {
        &self.key
    }

    /// Configuration captured at creation
    pub fn config(&self) -> &RecordingConfig {
        &self.config
    }

    /// Handle received from the factory
    pub fn client(&self) -> &ClientHandle {
        &self.client
    }

    /// Whether reading the registry during creation failed with
    /// `RegistryNotReady`
    pub fn registry_not_ready_at_create(&self) -> bool {
        self.registry_not_ready_at_create
    }
}

#[async_trait]
impl Plugin for RecordingPlugin {
    async fn close(&self) -> PluginResult<()> {
        self.events.record_closed(&self.key);

        if self.fail_close {
            return Err(PluginError::runtime(format!("plugin '{}' failed to close", self.key)));
        }
        Ok(())
    }
}
