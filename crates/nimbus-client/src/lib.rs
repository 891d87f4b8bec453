//! # Nimbus Client
//!
//! Composable client for the Nimbus backend platform.
//!
//! Feature areas (auth, functions, storage, ...) are plugins installed on a
//! [`ClientBuilder`]. Each plugin is described by a [`PluginDescriptor`]:
//! a key, a configuration built at install time, and a factory run while the
//! client is being built. The finished [`NimbusClient`] owns the transport
//! and the [`PluginManager`] holding every plugin, and closes both once.
//!
//! ```rust,no_run
//! use nimbus_client::prelude::*;
//!
//! # async fn run() -> nimbus_core::Result<()> {
//! let client = NimbusClient::builder("abc.nimbus.dev", "anon-key")
//!     .teardown_policy(TeardownPolicy::Collect)
//!     .build()
//!     .await?;
//!
//! for key in client.plugins()?.keys() {
//!     println!("installed: {key}");
//! }
//!
//! client.close().await?;
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]
#![warn(
    missing_docs,
    missing_debug_implementations,
    rust_2018_idioms,
    unreachable_pub
)]

pub mod builder;
pub mod client;
pub mod plugin;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use builder::ClientBuilder;
pub use client::{ClientHandle, NimbusClient};
pub use plugin::{InstalledPlugin, PluginDescriptor, PluginManager};

/// Re-export commonly used types
pub mod prelude {
    pub use crate::builder::ClientBuilder;
    pub use crate::client::{ClientHandle, NimbusClient};
    pub use crate::plugin::{PluginDescriptor, PluginManager};
    pub use nimbus_core::prelude::*;
}
