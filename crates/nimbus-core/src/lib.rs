//! # Nimbus Core
//!
//! Core types, traits, and error handling for the Nimbus SDK.
//!
//! This crate provides the foundational abstractions shared by every other
//! Nimbus crate:
//! - The [`Plugin`] trait and [`PluginKey`] identity
//! - Connection parameters for the hosted backend
//! - The error taxonomy used across the client lifecycle
//! - Teardown aggregation and policy

#![forbid(unsafe_code)]
#![warn(
    missing_docs,
    missing_debug_implementations,
    rust_2018_idioms,
    unreachable_pub
)]

pub mod error;
pub mod plugin;
pub mod teardown;
pub mod types;

pub use error::{Error, Result};
pub use plugin::{Plugin, PluginError, PluginKey, PluginResult};
pub use teardown::{TeardownError, TeardownFailure, TeardownPolicy};
pub use types::ConnectionParams;

/// Re-export commonly used types
pub mod prelude {
    pub use crate::error::{Error, Result};
    pub use crate::plugin::{Plugin, PluginError, PluginKey, PluginResult};
    pub use crate::teardown::{TeardownError, TeardownPolicy};
    pub use crate::types::ConnectionParams;
    pub use async_trait::async_trait;
}
