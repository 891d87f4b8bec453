//! Configuration validation

use crate::ClientConfig;
use nimbus_core::{ConnectionParams, Error, Result};

const LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];

/// Validate configuration
pub fn validate_config(config: &ClientConfig) -> Result<()> {
    validate_target(config)?;
    validate_headers(config)?;
    validate_logging(config)?;
    validate_plugins(config)?;

    Ok(())
}

fn validate_target(config: &ClientConfig) -> Result<()> {
    // Same rules the client builder enforces
    ConnectionParams::new(&config.host, &config.api_key)?;

    if config.request_timeout.is_zero() {
        return Err(Error::Config("request_timeout must be > 0".to_string()));
    }

    if config.request_timeout.as_secs() > 300 {
        tracing::warn!("request_timeout is very high (>5 minutes)");
    }

    if !config.use_https {
        tracing::warn!(host = %config.host, "HTTPS is disabled");
    }

    Ok(())
}

fn validate_headers(config: &ClientConfig) -> Result<()> {
    for (name, value) in &config.headers {
        http::HeaderName::from_bytes(name.as_bytes())
            .map_err(|e| Error::Config(format!("Invalid header name '{name}': {e}")))?;
        http::HeaderValue::from_str(value)
            .map_err(|e| Error::Config(format!("Invalid value for header '{name}': {e}")))?;
    }

    Ok(())
}

fn validate_logging(config: &ClientConfig) -> Result<()> {
    let level = config.logging.level.to_ascii_lowercase();
    if !LOG_LEVELS.contains(&level.as_str()) {
        return Err(Error::Config(format!(
            "Invalid log level: {} (must be one of {})",
            config.logging.level,
            LOG_LEVELS.join(", ")
        )));
    }

    Ok(())
}

fn validate_plugins(config: &ClientConfig) -> Result<()> {
    for (key, section) in &config.plugins {
        if key.trim().is_empty() {
            return Err(Error::Config("plugin key cannot be empty".to_string()));
        }

        if !section.is_object() && !section.is_null() {
            return Err(Error::Config(format!(
                "Configuration for plugin '{key}' must be a table"
            )));
        }
    }

    Ok(())
}
