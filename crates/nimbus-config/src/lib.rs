//! Configuration for the Nimbus client
//!
//! A config file carries the connection parameters, the teardown policy,
//! logging settings, and one free-form section per plugin. Files may be
//! YAML, TOML or JSON and can reference the environment with `${VAR}` or
//! `${VAR:-default}`. `NIMBUS_*` variables override the loaded values.

#![forbid(unsafe_code)]
#![warn(
    missing_docs,
    missing_debug_implementations,
    rust_2018_idioms,
    unreachable_pub
)]

pub mod loader;
pub mod types;
pub mod validator;

pub use loader::{apply_env_overrides, load_config, load_from_file, load_from_str, ConfigFormat};
pub use types::{ClientConfig, LogFormat, LoggingConfig};
pub use validator::validate_config;
