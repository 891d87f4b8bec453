//! Configuration loading

use crate::ClientConfig;
use humantime_serde::re::humantime;
use nimbus_core::{Error, Result, TeardownPolicy};
use regex::Regex;
use std::env;
use std::fs;
use std::path::Path;

/// Environment variable overriding [`ClientConfig::host`]
pub const ENV_HOST: &str = "NIMBUS_HOST";
/// Environment variable overriding [`ClientConfig::api_key`]
pub const ENV_API_KEY: &str = "NIMBUS_API_KEY";
/// Environment variable overriding [`ClientConfig::use_https`]
pub const ENV_USE_HTTPS: &str = "NIMBUS_USE_HTTPS";
/// Environment variable overriding [`ClientConfig::request_timeout`]
pub const ENV_REQUEST_TIMEOUT: &str = "NIMBUS_REQUEST_TIMEOUT";
/// Environment variable overriding [`ClientConfig::teardown`]
pub const ENV_TEARDOWN: &str = "NIMBUS_TEARDOWN";

/// Serialization format of a config file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigFormat {
    /// `.yaml` or `.yml`
    Yaml,
    /// `.toml`
    Toml,
    /// `.json`
    Json,
}

impl ConfigFormat {
    /// Pick the format from the file extension
    pub fn from_path(path: &Path) -> Result<Self> {
        match path.extension().and_then(|ext| ext.to_str()) {
            Some("yaml" | "yml") => Ok(Self::Yaml),
            Some("toml") => Ok(Self::Toml),
            Some("json") => Ok(Self::Json),
            _ => Err(Error::Config(format!(
                "Cannot tell the format of config file '{}': expected a .yaml, .yml, .toml or .json extension",
                path.display()
            ))),
        }
    }
}

/// Load configuration from a file
pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<ClientConfig> {
    let path = path.as_ref();
    let format = ConfigFormat::from_path(path)?;

    let content = fs::read_to_string(path)
        .map_err(|e| Error::Config(format!("Failed to read config file '{}': {e}", path.display())))?;

    load_from_str(&content, format)
}

/// Expand environment variables in configuration string
/// Supports syntax: ${VAR} and ${VAR:-default}
fn expand_env_vars(content: &str) -> Result<String> {
    let re = Regex::new(r"\$\{([A-Za-z_][A-Za-z0-9_]*)(:-([^}]*))?\}")
        .map_err(|e| Error::Config(format!("Invalid regex: {e}")))?;

    let mut result = String::with_capacity(content.len());
    let mut last_match = 0;

    for cap in re.captures_iter(content) {
        let (Some(full_match), Some(var_name)) = (cap.get(0), cap.get(1)) else {
            continue;
        };
        let var_name = var_name.as_str();
        let default_value = cap.get(3).map(|m| m.as_str());

        let value = match (env::var(var_name), default_value) {
            (Ok(val), _) => val,
            (Err(_), Some(default)) => default.to_string(),
            (Err(_), None) => {
                return Err(Error::Config(format!(
                    "Environment variable '{var_name}' not set and no default provided"
                )));
            }
        };

        result.push_str(&content[last_match..full_match.start()]);
        result.push_str(&value);
        last_match = full_match.end();
    }

    result.push_str(&content[last_match..]);

    Ok(result)
}

/// Load configuration from a string
pub fn load_from_str(content: &str, format: ConfigFormat) -> Result<ClientConfig> {
    let expanded_content = expand_env_vars(content)?;

    let config = match format {
        ConfigFormat::Yaml => serde_yaml::from_str(&expanded_content)
            .map_err(|e| Error::Config(format!("Failed to parse YAML: {e}")))?,
        ConfigFormat::Toml => toml::from_str(&expanded_content)
            .map_err(|e| Error::Config(format!("Failed to parse TOML: {e}")))?,
        ConfigFormat::Json => serde_json::from_str(&expanded_content)
            .map_err(|e| Error::Config(format!("Failed to parse JSON: {e}")))?,
    };

    Ok(config)
}

/// Apply `NIMBUS_*` overrides from the process environment
pub fn apply_env_overrides(config: &mut ClientConfig) -> Result<()> {
    apply_overrides_from(config, |name| env::var(name).ok())
}

/// Apply `NIMBUS_*` overrides from an arbitrary variable source
pub fn apply_overrides_from<F>(config: &mut ClientConfig, lookup: F) -> Result<()>
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(host) = lookup(ENV_HOST) {
        config.host = host;
    }

    if let Some(api_key) = lookup(ENV_API_KEY) {
        config.api_key = api_key;
    }

    if let Some(raw) = lookup(ENV_USE_HTTPS) {
        config.use_https = match raw.to_ascii_lowercase().as_str() {
            "1" | "true" | "yes" => true,
            "0" | "false" | "no" => false,
            _ => {
                return Err(Error::Config(format!(
                    "{ENV_USE_HTTPS} must be true or false, got '{raw}'"
                )))
            }
        };
    }

    if let Some(raw) = lookup(ENV_REQUEST_TIMEOUT) {
        config.request_timeout = humantime::parse_duration(&raw)
            .map_err(|e| Error::Config(format!("Invalid {ENV_REQUEST_TIMEOUT} '{raw}': {e}")))?;
    }

    if let Some(raw) = lookup(ENV_TEARDOWN) {
        config.teardown = match raw.to_ascii_lowercase().as_str() {
            "collect" => TeardownPolicy::Collect,
            "log" => TeardownPolicy::Log,
            _ => {
                return Err(Error::Config(format!(
                    "{ENV_TEARDOWN} must be 'collect' or 'log', got '{raw}'"
                )))
            }
        };
    }

    Ok(())
}

/// Load, optionally override from the environment, and validate
pub fn load_config<P: AsRef<Path>>(path: P, env_overrides: bool) -> Result<ClientConfig> {
    let mut config = load_from_file(path)?;

    if env_overrides {
        apply_env_overrides(&mut config)?;
    }

    crate::validator::validate_config(&config)?;

    Ok(config)
}
