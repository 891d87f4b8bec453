//! Client builder

use crate::client::NimbusClient;
use crate::plugin::{PendingPlugin, PluginDescriptor, PluginManager};
use http::{HeaderMap, HeaderName, HeaderValue};
use nimbus_config::ClientConfig;
use nimbus_core::{ConnectionParams, Error, PluginKey, Result, TeardownPolicy};
use nimbus_transport::{HttpEngine, HttpTransport, ReqwestEngine, RequestHook, TransportConfig};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};

type HttpCustomizer = Box<dyn FnOnce(reqwest::ClientBuilder) -> reqwest::ClientBuilder + Send>;

/// Builder for [`NimbusClient`]
///
/// Plugins are configured eagerly by [`ClientBuilder::install`] and created
/// by [`ClientBuilder::build`], in installation order, once the client
/// exists.
///
/// # Example
///
/// ```rust,no_run
/// use nimbus_client::ClientBuilder;
/// use std::time::Duration;
///
/// # async fn run() -> nimbus_core::Result<()> {
/// let client = ClientBuilder::new()
///     .host("abc.nimbus.dev")
///     .api_key("anon-key")
///     .request_timeout(Duration::from_secs(5))
///     .build()
///     .await?;
/// # Ok(())
/// # }
/// ```
pub struct ClientBuilder {
    host: Option<String>,
    api_key: Option<String>,
    use_https: bool,
    request_timeout: Duration,
    default_headers: HeaderMap,
    hooks: Vec<RequestHook>,
    engine: Option<Arc<dyn HttpEngine>>,
    http_customizer: Option<HttpCustomizer>,
    teardown_policy: TeardownPolicy,
    pending: Vec<PendingPlugin>,
}

impl ClientBuilder {
    /// Create an empty builder
    pub fn new() -> Self {
        Self {
            host: None,
            api_key: None,
            use_https: true,
            request_timeout: ConnectionParams::DEFAULT_REQUEST_TIMEOUT,
            default_headers: HeaderMap::new(),
            hooks: Vec::new(),
            engine: None,
            http_customizer: None,
            teardown_policy: TeardownPolicy::default(),
            pending: Vec::new(),
        }
    }

    /// Create a builder from a loaded configuration
    ///
    /// Plugin sections are not installed here; each plugin crate reads its
    /// own section with [`ClientConfig::plugin_section`].
    pub fn from_config(config: &ClientConfig) -> Result<Self> {
        let mut builder = Self::new()
            .host(&config.host)
            .api_key(&config.api_key)
            .use_https(config.use_https)
            .request_timeout(config.request_timeout)
            .teardown_policy(config.teardown);

        for (name, value) in &config.headers {
            let name = HeaderName::from_bytes(name.as_bytes())
                .map_err(|e| Error::config(format!("Invalid header name '{name}': {e}")))?;
            let value = HeaderValue::from_str(value)
                .map_err(|e| Error::config(format!("Invalid value for header '{name}': {e}")))?;
            builder = builder.default_header(name, value);
        }

        Ok(builder)
    }

    /// Backend host without scheme, e.g. `abc.nimbus.dev`
    pub fn host(mut self, host: impl Into<String>) -> Self {
        self.host = Some(host.into());
        self
    }

    /// API key sent with every request
    pub fn api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    /// Use HTTPS (default) or plain HTTP
    pub fn use_https(mut self, use_https: bool) -> Self {
        self.use_https = use_https;
        self
    }

    /// Per-request timeout
    pub fn request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Header added to every request unless the request sets it
    pub fn default_header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.default_headers.insert(name, value);
        self
    }

    /// Hook run on every prepared request
    pub fn request_hook<F>(mut self, hook: F) -> Self
    where
        F: Fn(&mut http::Request<bytes::Bytes>) + Send + Sync + 'static,
    {
        self.hooks.push(Arc::new(hook));
        self
    }

    /// Use a specific HTTP engine instead of the default reqwest one
    pub fn engine(mut self, engine: Arc<dyn HttpEngine>) -> Self {
        self.engine = Some(engine);
        self
    }

    /// Customize the reqwest client used by the default engine
    ///
    /// Ignored when an engine is set with [`ClientBuilder::engine`].
    pub fn configure_http<F>(mut self, configure: F) -> Self
    where
        F: FnOnce(reqwest::ClientBuilder) -> reqwest::ClientBuilder + Send + 'static,
    {
        self.http_customizer = Some(Box::new(configure));
        self
    }

    /// What [`NimbusClient::close`] does with plugin teardown failures
    pub fn teardown_policy(mut self, policy: TeardownPolicy) -> Self {
        self.teardown_policy = policy;
        self
    }

    /// Install a plugin, configuring it with `configure`
    ///
    /// The configuration is built and validated now; the plugin itself is
    /// created by [`ClientBuilder::build`]. Fails with
    /// [`Error::DuplicatePlugin`] if the key is already installed and with
    /// [`Error::PluginConfig`] if the configuration is rejected.
    pub fn install<D, F>(mut self, descriptor: D, configure: F) -> Result<Self>
    where
        D: PluginDescriptor,
        F: FnOnce(&mut D::Config),
    {
        let key = descriptor.key();

        if key.is_empty() {
            return Err(Error::config("plugin key cannot be empty"));
        }

        if self.pending.iter().any(|p| p.key() == &key) {
            return Err(Error::DuplicatePlugin(key));
        }

        let config = descriptor
            .create_config(configure)
            .map_err(|source| Error::PluginConfig {
                key: key.clone(),
                source,
            })?;

        debug!(plugin = %key, "Plugin installed");

        self.pending.push(PendingPlugin::new(key, descriptor, config));
        Ok(self)
    }

    /// Install a plugin with its default configuration
    pub fn install_default<D: PluginDescriptor>(self, descriptor: D) -> Result<Self> {
        self.install(descriptor, |_| {})
    }

    /// Keys installed so far, in installation order
    pub fn installed_keys(&self) -> impl Iterator<Item = &PluginKey> {
        self.pending.iter().map(PendingPlugin::key)
    }

    /// Build the client
    ///
    /// Connection parameters are checked before anything is constructed.
    /// Plugins are then created in installation order with a handle to the
    /// new client. If any factory fails, the plugins already created are
    /// closed, the transport is closed and the error is returned.
    pub async fn build(self) -> Result<NimbusClient> {
        let host = self
            .host
            .filter(|h| !h.trim().is_empty())
            .ok_or_else(|| Error::config("host is required"))?;
        let api_key = self
            .api_key
            .filter(|k| !k.trim().is_empty())
            .ok_or_else(|| Error::config("api_key is required"))?;

        if self.request_timeout.is_zero() {
            return Err(Error::config("request_timeout must be > 0"));
        }

        let params = ConnectionParams::new(host, api_key)?
            .with_https(self.use_https)
            .with_request_timeout(self.request_timeout);

        let mut transport_config = TransportConfig::from_params(&params)?;
        transport_config.default_headers = self.default_headers;
        transport_config.hooks = self.hooks;

        let engine: Arc<dyn HttpEngine> = match (self.engine, self.http_customizer) {
            (Some(engine), customizer) => {
                if customizer.is_some() {
                    warn!(engine = engine.name(), "HTTP customizer ignored: engine set explicitly");
                }
                engine
            }
            (None, Some(customizer)) => Arc::new(ReqwestEngine::with_builder(customizer)?),
            (None, None) => Arc::new(ReqwestEngine::new()?),
        };

        let transport = HttpTransport::new(transport_config, engine);
        let client = NimbusClient::shell(params, transport, self.teardown_policy);

        info!(
            base_url = %client.base_url(),
            engine = client.transport().engine_name(),
            plugins = self.pending.len(),
            "Building client"
        );

        let plugins = match PluginManager::install_all(self.pending, &client.handle()).await {
            Ok(plugins) => plugins,
            Err(e) => {
                error!(error = %e, "Client build failed");
                client.abort().await;
                return Err(e);
            }
        };

        client.attach_plugins(plugins)?;

        info!(base_url = %client.base_url(), "Client ready");

        Ok(client)
    }
}

impl Default for ClientBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for ClientBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientBuilder")
            .field("host", &self.host)
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("use_https", &self.use_https)
            .field("request_timeout", &self.request_timeout)
            .field("default_headers", &self.default_headers.len())
            .field("hooks", &self.hooks.len())
            .field("engine", &self.engine)
            .field("teardown_policy", &self.teardown_policy)
            .field("plugins", &self.pending)
            .finish()
    }
}
