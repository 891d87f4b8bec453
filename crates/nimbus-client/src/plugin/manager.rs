//! Per-client plugin registry

use super::descriptor::PluginDescriptor;
use crate::client::ClientHandle;
use nimbus_core::{Error, Plugin, PluginKey, PluginResult, Result, TeardownError};
use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, info, warn};

type Factory = Box<dyn FnOnce(&ClientHandle) -> PluginResult<InstalledPlugin> + Send>;

/// Plugin accepted by the builder whose factory has not run yet
pub(crate) struct PendingPlugin {
    key: PluginKey,
    factory: Factory,
}

impl PendingPlugin {
    /// Capture a descriptor and its validated configuration
    pub(crate) fn new<D: PluginDescriptor>(key: PluginKey, descriptor: D, config: D::Config) -> Self {
        let plugin_key = key.clone();
        let factory: Factory = Box::new(move |client: &ClientHandle| {
            let plugin = descriptor.create(client.clone(), config)?;
            Ok(InstalledPlugin::new(plugin_key, plugin))
        });

        Self { key, factory }
    }

    pub(crate) fn key(&self) -> &PluginKey {
        &self.key
    }
}

impl fmt::Debug for PendingPlugin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PendingPlugin")
            .field("key", &self.key)
            .finish_non_exhaustive()
    }
}

/// A live plugin together with its type-erased handle
///
/// The same allocation is held twice: once as `dyn Plugin` for teardown and
/// once as `dyn Any` so lookups can recover the concrete type. The teardown
/// handle never leaves the registry; plugins are closed only through
/// [`PluginManager::close_all`].
#[derive(Clone)]
pub struct InstalledPlugin {
    key: PluginKey,
    type_name: &'static str,
    instance: Arc<dyn Plugin>,
    erased: Arc<dyn Any + Send + Sync>,
}

impl InstalledPlugin {
    /// Wrap a freshly created plugin
    pub fn new<P: Plugin>(key: PluginKey, plugin: P) -> Self {
        let plugin = Arc::new(plugin);
        let instance: Arc<dyn Plugin> = plugin.clone();
        let erased: Arc<dyn Any + Send + Sync> = plugin;

        Self {
            key,
            type_name: std::any::type_name::<P>(),
            instance,
            erased,
        }
    }

    /// Plugin key
    pub fn key(&self) -> &PluginKey {
        &self.key
    }

    /// Concrete type name of the plugin
    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    /// Recover the concrete plugin type
    pub fn downcast<P: Plugin>(&self) -> Result<Arc<P>> {
        Arc::clone(&self.erased)
            .downcast::<P>()
            .map_err(|_| Error::PluginTypeMismatch {
                key: self.key.clone(),
                expected: std::any::type_name::<P>(),
            })
    }
}

impl fmt::Debug for InstalledPlugin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InstalledPlugin")
            .field("key", &self.key)
            .field("type_name", &self.type_name)
            .finish()
    }
}

/// Registry of the plugins installed on one client
///
/// Built in a single step while the client is constructed and read-only
/// afterwards. Plugins are kept in installation order and closed in reverse.
pub struct PluginManager {
    plugins: Vec<InstalledPlugin>,
    index: HashMap<PluginKey, usize>,
    closed: AtomicBool,
}

impl PluginManager {
    /// Run every pending factory in installation order
    ///
    /// If a factory fails, the plugins already created are closed in reverse
    /// order before the error is returned.
    pub(crate) async fn install_all(pending: Vec<PendingPlugin>, client: &ClientHandle) -> Result<Self> {
        let mut manager = Self::with_capacity(pending.len());

        for PendingPlugin { key, factory } in pending {
            if manager.contains(key.as_str()) {
                manager.rollback(&key).await;
                return Err(Error::DuplicatePlugin(key));
            }

            debug!(plugin = %key, "Creating plugin");

            match factory(client) {
                Ok(installed) => {
                    debug!(plugin = %key, plugin_type = installed.type_name(), "Plugin created");
                    manager.index.insert(key, manager.plugins.len());
                    manager.plugins.push(installed);
                }
                Err(source) => {
                    warn!(plugin = %key, error = %source, "Plugin creation failed");
                    manager.rollback(&key).await;
                    return Err(Error::PluginCreation { key, source });
                }
            }
        }

        info!(count = manager.len(), "Plugins installed");

        Ok(manager)
    }

    fn with_capacity(capacity: usize) -> Self {
        Self {
            plugins: Vec::with_capacity(capacity),
            index: HashMap::with_capacity(capacity),
            closed: AtomicBool::new(false),
        }
    }

    async fn rollback(&self, failed: &PluginKey) {
        if self.is_empty() {
            return;
        }

        warn!(plugin = %failed, created = self.len(), "Rolling back plugins");

        if let Err(e) = self.close_all().await {
            warn!(error = %e, "Rollback left plugins in a failed state");
        }
    }

    /// Typed lookup through the plugin's descriptor
    pub fn get<D: PluginDescriptor>(&self, descriptor: &D) -> Result<Arc<D::Plugin>> {
        self.get_by_key::<D::Plugin>(descriptor.key().as_str())
    }

    /// Typed lookup by key
    pub fn get_by_key<P: Plugin>(&self, key: &str) -> Result<Arc<P>> {
        self.installed(key)
            .ok_or_else(|| Error::PluginNotInstalled(PluginKey::new(key)))?
            .downcast::<P>()
    }

    /// Typed lookup of a plugin that may not be installed
    ///
    /// Returns `Ok(None)` when the key is absent. A type mismatch is still
    /// an error.
    pub fn try_get<D: PluginDescriptor>(&self, descriptor: &D) -> Result<Option<Arc<D::Plugin>>> {
        match self.installed(descriptor.key().as_str()) {
            Some(installed) => installed.downcast::<D::Plugin>().map(Some),
            None => Ok(None),
        }
    }

    /// Type-erased entry for a key
    pub fn installed(&self, key: &str) -> Option<&InstalledPlugin> {
        self.index.get(key).map(|&i| &self.plugins[i])
    }

    /// Check if a plugin is installed
    pub fn contains(&self, key: &str) -> bool {
        self.index.contains_key(key)
    }

    /// Installed keys in installation order
    pub fn keys(&self) -> impl Iterator<Item = &PluginKey> {
        self.plugins.iter().map(InstalledPlugin::key)
    }

    /// Installed plugins in installation order
    pub fn iter(&self) -> impl Iterator<Item = &InstalledPlugin> {
        self.plugins.iter()
    }

    /// Number of installed plugins
    pub fn len(&self) -> usize {
        self.plugins.len()
    }

    /// Check if no plugin is installed
    pub fn is_empty(&self) -> bool {
        self.plugins.is_empty()
    }

    /// Check if the plugins have been closed
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Close every plugin once, in reverse installation order
    ///
    /// Every plugin is attempted even when an earlier one fails; failures are
    /// reported together. Later calls do nothing and return `Ok(())`.
    pub async fn close_all(&self) -> std::result::Result<(), TeardownError> {
        if self.closed.swap(true, Ordering::AcqRel) {
            debug!("Plugins already closed");
            return Ok(());
        }

        let mut failures = TeardownError::new();

        for plugin in self.plugins.iter().rev() {
            debug!(plugin = %plugin.key, "Closing plugin");

            if let Err(e) = plugin.instance.close().await {
                warn!(plugin = %plugin.key, error = %e, "Plugin failed to close");
                failures.push(plugin.key.clone(), e);
            }
        }

        info!(
            count = self.len(),
            failed = failures.len(),
            "Plugins closed"
        );

        failures.into_result()
    }
}

impl fmt::Debug for PluginManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PluginManager")
            .field("plugins", &self.plugins)
            .field("closed", &self.is_closed())
            .finish()
    }
}
