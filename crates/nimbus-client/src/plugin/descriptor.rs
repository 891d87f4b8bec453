//! Plugin descriptor protocol

use crate::client::ClientHandle;
use nimbus_core::{Plugin, PluginKey, PluginResult};

/// Stateless blueprint a plugin module exposes for installation
///
/// A descriptor supplies the plugin's key, builds its configuration from a
/// user callback, and creates the plugin once the client shell exists.
/// Descriptors carry no per-client state and are usually unit structs shared
/// by every client that installs them.
///
/// # Construction contract
///
/// [`PluginDescriptor::create`] runs while the client is still being built.
/// It may store the [`ClientHandle`] and may use the client's transport, but
/// it must not read the plugin registry: during construction
/// `client.plugins()` fails with `Error::RegistryNotReady`. Sibling plugins
/// must be resolved lazily, at call time.
///
/// # Example
///
/// ```rust
/// use nimbus_client::{ClientHandle, PluginDescriptor};
/// use nimbus_core::{Plugin, PluginError, PluginKey, PluginResult};
/// use std::time::Duration;
///
/// #[derive(Debug, Default)]
/// pub struct StorageConfig {
///     pub upload_timeout: Option<Duration>,
/// }
///
/// #[derive(Debug)]
/// pub struct Storage {
///     client: ClientHandle,
///     config: StorageConfig,
/// }
///
/// impl Plugin for Storage {}
///
/// pub struct StorageDescriptor;
///
/// impl PluginDescriptor for StorageDescriptor {
///     type Config = StorageConfig;
///     type Plugin = Storage;
///
///     fn key(&self) -> PluginKey {
///         PluginKey::from_static("storage")
///     }
///
///     fn validate_config(&self, config: &StorageConfig) -> PluginResult<()> {
///         if config.upload_timeout == Some(Duration::ZERO) {
///             return Err(PluginError::config("upload_timeout must be > 0"));
///         }
///         Ok(())
///     }
///
///     fn create(&self, client: ClientHandle, config: StorageConfig) -> PluginResult<Storage> {
///         Ok(Storage { client, config })
///     }
/// }
/// ```
pub trait PluginDescriptor: Send + Sync + 'static {
    /// Per-plugin configuration, built from its `Default`
    type Config: Default + Send + 'static;

    /// Plugin type produced by [`PluginDescriptor::create`]
    type Plugin: Plugin;

    /// Key identifying the plugin within a client
    fn key(&self) -> PluginKey;

    /// Check a configuration before it is accepted
    fn validate_config(&self, _config: &Self::Config) -> PluginResult<()> {
        Ok(())
    }

    /// Apply `configure` to a default configuration and validate the result
    fn create_config<F>(&self, configure: F) -> PluginResult<Self::Config>
    where
        Self: Sized,
        F: FnOnce(&mut Self::Config),
    {
        let mut config = Self::Config::default();
        configure(&mut config);
        self.validate_config(&config)?;
        Ok(config)
    }

    /// Create the plugin for the client being built
    fn create(&self, client: ClientHandle, config: Self::Config) -> PluginResult<Self::Plugin>;
}
