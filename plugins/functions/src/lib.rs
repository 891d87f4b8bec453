//! Serverless functions plugin for the Nimbus client
//!
//! Invokes functions through the client's transport. When the `auth` plugin
//! is installed and holds a live session, its access token is sent instead of
//! the API key.

#![forbid(unsafe_code)]
#![warn(
    missing_docs,
    missing_debug_implementations,
    rust_2018_idioms,
    unreachable_pub
)]

use http::header::AUTHORIZATION;
use http::{HeaderName, HeaderValue};
use nimbus_auth::Auth;
use nimbus_client::{ClientHandle, PluginDescriptor};
use nimbus_core::{Error, Plugin, PluginError, PluginKey, PluginResult, Result};
use nimbus_transport::{TransportRequest, TransportResponse};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::debug;

/// Header selecting the region a function runs in
pub const REGION_HEADER: &str = "x-region";

/// Descriptor of the functions plugin
#[derive(Debug, Clone, Copy, Default)]
pub struct Functions;

impl Functions {
    /// Key the plugin is installed under
    pub const KEY: PluginKey = PluginKey::from_static("functions");
}

/// Functions plugin configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FunctionsConfig {
    /// Region to run functions in; the backend picks one when unset
    pub region: Option<String>,

    /// Headers added to every invocation
    pub headers: BTreeMap<String, String>,
}

impl PluginDescriptor for Functions {
    type Config = FunctionsConfig;
    type Plugin = FunctionsPlugin;

    fn key(&self) -> PluginKey {
        Self::KEY
    }

    fn validate_config(&self, config: &FunctionsConfig) -> PluginResult<()> {
        if config.region.as_deref().is_some_and(|r| r.trim().is_empty()) {
            return Err(PluginError::config("region cannot be empty"));
        }

        for (name, value) in &config.headers {
            HeaderName::from_bytes(name.as_bytes())
                .map_err(|e| PluginError::config(format!("invalid header name '{name}': {e}")))?;
            HeaderValue::from_str(value)
                .map_err(|e| PluginError::config(format!("invalid value for header '{name}': {e}")))?;
        }

        Ok(())
    }

    fn create(&self, client: ClientHandle, config: FunctionsConfig) -> PluginResult<FunctionsPlugin> {
        let mut headers = Vec::with_capacity(config.headers.len() + 1);

        if let Some(region) = &config.region {
            headers.push((HeaderName::from_static(REGION_HEADER), header_value(region)?));
        }
        for (name, value) in &config.headers {
            let name = HeaderName::from_bytes(name.as_bytes()).map_err(PluginError::config)?;
            headers.push((name, header_value(value)?));
        }

        Ok(FunctionsPlugin {
            client,
            region: config.region,
            headers,
        })
    }
}

fn header_value(value: &str) -> PluginResult<HeaderValue> {
    HeaderValue::from_str(value).map_err(PluginError::config)
}

/// Invokes serverless functions
#[derive(Debug)]
pub struct FunctionsPlugin {
    client: ClientHandle,
    region: Option<String>,
    headers: Vec<(HeaderName, HeaderValue)>,
}

impl FunctionsPlugin {
    /// Configured region
    pub fn region(&self) -> Option<&str> {
        self.region.as_deref()
    }

    /// Invoke a function with a JSON body
    ///
    /// Non-success responses are returned as [`Error::Http`].
    pub async fn invoke<B>(&self, name: &str, body: &B) -> Result<TransportResponse>
    where
        B: Serialize + ?Sized,
    {
        let name = name.trim_matches('/');
        if name.is_empty() {
            return Err(Error::config("function name is required"));
        }

        let client = self.client.upgrade()?;

        let mut request = TransportRequest::post(format!("functions/v1/{name}")).json(body)?;
        for (header, value) in &self.headers {
            request = request.header(header.clone(), value.clone());
        }

        // Sibling lookup happens per call; the registry is not readable
        // while plugins are being created.
        let user_token = match client.plugins()?.try_get(&Auth)? {
            Some(auth) => auth.access_token(),
            None => None,
        };

        if let Some(token) = &user_token {
            let mut bearer = HeaderValue::from_str(&format!("Bearer {token}"))
                .map_err(|e| Error::config(format!("access token is not a valid header value: {e}")))?;
            bearer.set_sensitive(true);
            request = request.header(AUTHORIZATION, bearer);
        }

        debug!(
            function = name,
            region = ?self.region,
            user_session = user_token.is_some(),
            "Invoking function"
        );

        client.transport().execute(request).await?.error_for_status()
    }

    /// Invoke a function and deserialize its JSON response
    pub async fn invoke_json<B, R>(&self, name: &str, body: &B) -> Result<R>
    where
        B: Serialize + ?Sized,
        R: DeserializeOwned,
    {
        self.invoke(name, body).await?.json()
    }
}

impl Plugin for FunctionsPlugin {}
