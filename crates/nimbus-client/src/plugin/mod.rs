//! Plugin descriptors and the per-client plugin registry

pub mod descriptor;
pub mod manager;

pub use descriptor::PluginDescriptor;
pub use manager::{InstalledPlugin, PluginManager};

pub(crate) use manager::PendingPlugin;
