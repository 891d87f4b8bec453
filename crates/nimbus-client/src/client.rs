//! Composed client and the handle given to plugins

use crate::builder::ClientBuilder;
use crate::plugin::{PluginDescriptor, PluginManager};
use nimbus_core::{ConnectionParams, Error, Result, TeardownPolicy};
use nimbus_transport::HttpTransport;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, OnceLock, Weak};
use tracing::{debug, error, info, warn};
use url::Url;

pub(crate) struct ClientInner {
    params: ConnectionParams,
    transport: HttpTransport,
    plugins: OnceLock<PluginManager>,
    teardown_policy: TeardownPolicy,
    closed: AtomicBool,
}

impl Drop for ClientInner {
    fn drop(&mut self) {
        if !self.closed.load(Ordering::Acquire) {
            debug!(host = %self.params.host(), "Client dropped without close");
        }
    }
}

/// Client composed of a transport and the plugins installed on it
///
/// Cloning is cheap and every clone refers to the same client. Plugins are
/// retrieved by descriptor through [`NimbusClient::plugin`] or
/// [`NimbusClient::plugins`].
///
/// # Example
///
/// ```rust,no_run
/// use nimbus_client::NimbusClient;
///
/// # async fn run() -> nimbus_core::Result<()> {
/// let client = NimbusClient::builder("abc.nimbus.dev", "anon-key")
///     .build()
///     .await?;
///
/// client.close().await?;
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct NimbusClient {
    inner: Arc<ClientInner>,
}

impl NimbusClient {
    /// Start building a client for the given host and API key
    pub fn builder(host: impl Into<String>, api_key: impl Into<String>) -> ClientBuilder {
        ClientBuilder::new().host(host).api_key(api_key)
    }

    /// Allocate a client whose registry is not attached yet
    pub(crate) fn shell(
        params: ConnectionParams,
        transport: HttpTransport,
        teardown_policy: TeardownPolicy,
    ) -> Self {
        Self {
            inner: Arc::new(ClientInner {
                params,
                transport,
                plugins: OnceLock::new(),
                teardown_policy,
                closed: AtomicBool::new(false),
            }),
        }
    }

    /// Attach the finished registry
    pub(crate) fn attach_plugins(&self, plugins: PluginManager) -> Result<()> {
        self.inner
            .plugins
            .set(plugins)
            .map_err(|_| Error::Internal("plugin registry attached twice".to_string()))
    }

    /// Release the transport of a client whose build failed
    pub(crate) async fn abort(&self) {
        self.inner.closed.store(true, Ordering::Release);
        self.inner.transport.close().await;
    }

    /// Connection parameters
    pub fn params(&self) -> &ConnectionParams {
        &self.inner.params
    }

    /// Base URL of the backend
    pub fn base_url(&self) -> &Url {
        self.inner.transport.base_url()
    }

    /// Transport shared with the plugins
    pub fn transport(&self) -> &HttpTransport {
        &self.inner.transport
    }

    /// Installed plugins
    ///
    /// Fails with [`Error::RegistryNotReady`] while the client is still being
    /// built, i.e. when called from a plugin factory.
    pub fn plugins(&self) -> Result<&PluginManager> {
        self.inner.plugins.get().ok_or(Error::RegistryNotReady)
    }

    /// Typed lookup of an installed plugin
    pub fn plugin<D: PluginDescriptor>(&self, descriptor: &D) -> Result<Arc<D::Plugin>> {
        self.plugins()?.get(descriptor)
    }

    /// Non-owning handle to this client
    pub fn handle(&self) -> ClientHandle {
        ClientHandle {
            inner: Arc::downgrade(&self.inner),
        }
    }

    /// Teardown policy applied by [`NimbusClient::close`]
    pub fn teardown_policy(&self) -> TeardownPolicy {
        self.inner.teardown_policy
    }

    /// Check if the client has been closed
    pub fn is_closed(&self) -> bool {
        self.inner.closed.load(Ordering::Acquire)
    }

    /// Close the transport, then every plugin in reverse installation order
    ///
    /// Only the first call does any work. With [`TeardownPolicy::Collect`]
    /// plugin failures are returned together as [`Error::Teardown`]; with
    /// [`TeardownPolicy::Log`] they are logged and the call succeeds.
    pub async fn close(&self) -> Result<()> {
        if self.inner.closed.swap(true, Ordering::AcqRel) {
            debug!("Client already closed");
            return Ok(());
        }

        info!(base_url = %self.base_url(), "Closing client");

        self.inner.transport.close().await;

        let result = match self.inner.plugins.get() {
            Some(plugins) => plugins.close_all().await,
            None => Ok(()),
        };

        match (result, self.inner.teardown_policy) {
            (Ok(()), _) => {
                info!("Client closed");
                Ok(())
            }
            (Err(failures), TeardownPolicy::Collect) => {
                error!(failed = failures.len(), error = %failures, "Client closed with errors");
                Err(Error::Teardown(failures))
            }
            (Err(failures), TeardownPolicy::Log) => {
                warn!(failed = failures.len(), error = %failures, "Client closed with errors");
                Ok(())
            }
        }
    }
}

impl fmt::Debug for NimbusClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NimbusClient")
            .field("params", &self.inner.params)
            .field("plugins", &self.inner.plugins.get())
            .field("teardown_policy", &self.inner.teardown_policy)
            .field("closed", &self.is_closed())
            .finish()
    }
}

/// Non-owning handle to a [`NimbusClient`]
///
/// Plugin factories receive one so that plugins can reach their client
/// without keeping it alive.
#[derive(Clone)]
pub struct ClientHandle {
    inner: Weak<ClientInner>,
}

impl ClientHandle {
    /// Handle that never resolves to a client
    #[cfg(test)]
    pub(crate) fn detached() -> Self {
        Self { inner: Weak::new() }
    }

    /// Get the client, or [`Error::ClientDropped`] if it no longer exists
    pub fn upgrade(&self) -> Result<NimbusClient> {
        self.inner
            .upgrade()
            .map(|inner| NimbusClient { inner })
            .ok_or(Error::ClientDropped)
    }

    /// Check if this handle refers to `client`
    pub fn is(&self, client: &NimbusClient) -> bool {
        std::ptr::eq(self.inner.as_ptr(), Arc::as_ptr(&client.inner))
    }
}

impl fmt::Debug for ClientHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientHandle")
            .field("alive", &(self.inner.strong_count() > 0))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{
        LifecycleLog, MockEngine, RecordingConfig, RecordingDescriptor, RecordingPlugin,
    };
    use nimbus_transport::{StatusCode, TransportRequest};

    async fn client_with(events: &LifecycleLog, engine: &MockEngine) -> NimbusClient {
        NimbusClient::builder("abc.nimbus.dev", "anon-key")
            .engine(Arc::new(engine.clone()))
            .install(RecordingDescriptor::new("auth", events), |c| {
                c.timeout = Some(std::time::Duration::from_secs(5))
            })
            .unwrap()
            .install_default(RecordingDescriptor::new("storage", events))
            .unwrap()
            .build()
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_distinct_typed_instances() {
        let events = LifecycleLog::new();
        let engine = MockEngine::new();
        let client = client_with(&events, &engine).await;

        let auth = client.plugin(&RecordingDescriptor::new("auth", &events)).unwrap();
        let storage = client.plugin(&RecordingDescriptor::new("storage", &events)).unwrap();

        assert_eq!(auth.key().as_str(), "auth");
        assert_eq!(storage.key().as_str(), "storage");
        assert!(!Arc::ptr_eq(&auth, &storage));
    }

    #[tokio::test]
    async fn test_auth_and_storage_scenario() {
        let events = LifecycleLog::new();
        let engine = MockEngine::new();
        let client = client_with(&events, &engine).await;

        let auth = client.plugin(&RecordingDescriptor::new("auth", &events)).unwrap();
        let storage = client.plugin(&RecordingDescriptor::new("storage", &events)).unwrap();

        assert_eq!(auth.config().timeout, Some(std::time::Duration::from_secs(5)));
        assert_eq!(storage.config(), &RecordingConfig::default());

        client.close().await.unwrap();

        assert_eq!(events.close_count("auth"), 1);
        assert_eq!(events.close_count("storage"), 1);
    }

    #[tokio::test]
    async fn test_close_twice() {
        let events = LifecycleLog::new();
        let engine = MockEngine::new();
        let client = client_with(&events, &engine).await;

        client.close().await.unwrap();
        client.close().await.unwrap();

        assert!(client.is_closed());
        assert_eq!(events.closed(), vec!["storage", "auth"]);
        assert_eq!(engine.close_count(), 1);
    }

    #[tokio::test]
    async fn test_handle_identity_and_registry_guard() {
        let events = LifecycleLog::new();
        let engine = MockEngine::new();
        let client = client_with(&events, &engine).await;

        let auth = client
            .plugins()
            .unwrap()
            .get_by_key::<RecordingPlugin>("auth")
            .unwrap();

        assert!(auth.client().is(&client));
        assert!(auth.client().upgrade().unwrap().handle().is(&client));
        assert!(auth.registry_not_ready_at_create());
    }

    #[tokio::test]
    async fn test_handle_after_drop() {
        let events = LifecycleLog::new();
        let engine = MockEngine::new();
        let client = client_with(&events, &engine).await;
        let handle = client.handle();

        client.close().await.unwrap();
        drop(client);

        assert!(matches!(handle.upgrade(), Err(Error::ClientDropped)));
    }

    #[tokio::test]
    async fn test_plugin_not_installed() {
        let events = LifecycleLog::new();
        let engine = MockEngine::new();
        let client = client_with(&events, &engine).await;

        let err = client
            .plugin(&RecordingDescriptor::new("realtime", &events))
            .unwrap_err();
        assert!(matches!(err, Error::PluginNotInstalled(ref key) if key.as_str() == "realtime"));
    }

    #[tokio::test]
    async fn test_teardown_failure_collected() {
        let events = LifecycleLog::new();
        let client = NimbusClient::builder("abc.nimbus.dev", "anon-key")
            .engine(Arc::new(MockEngine::new()))
            .install_default(RecordingDescriptor::new("a", &events).failing_close())
            .unwrap()
            .install_default(RecordingDescriptor::new("b", &events))
            .unwrap()
            .build()
            .await
            .unwrap();

        let err = client.close().await.unwrap_err();

        assert_eq!(events.closed(), vec!["b", "a"]);
        match err {
            Error::Teardown(failures) => {
                assert_eq!(failures.len(), 1);
                assert!(failures.contains("a"));
                assert!(!failures.contains("b"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn test_teardown_failure_logged() {
        let events = LifecycleLog::new();
        let client = NimbusClient::builder("abc.nimbus.dev", "anon-key")
            .engine(Arc::new(MockEngine::new()))
            .teardown_policy(TeardownPolicy::Log)
            .install_default(RecordingDescriptor::new("a", &events).failing_close())
            .unwrap()
            .install_default(RecordingDescriptor::new("b", &events))
            .unwrap()
            .build()
            .await
            .unwrap();

        client.close().await.unwrap();
        assert_eq!(events.closed(), vec!["b", "a"]);
    }

    #[tokio::test]
    async fn test_transport_after_close() {
        let events = LifecycleLog::new();
        let engine = MockEngine::new();
        engine.respond_with(StatusCode::OK, "[]");
        let client = client_with(&events, &engine).await;

        let response = client
            .transport()
            .execute(TransportRequest::get("rest/v1/todos"))
            .await
            .unwrap();
        assert!(response.is_success());

        client.close().await.unwrap();

        let err = client
            .transport()
            .execute(TransportRequest::get("rest/v1/todos"))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::ClientClosed));
        assert_eq!(engine.requests().len(), 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_close() {
        let events = LifecycleLog::new();
        let engine = MockEngine::new();
        let client = NimbusClient::builder("abc.nimbus.dev", "anon-key")
            .engine(Arc::new(engine.clone()))
            .install_default(RecordingDescriptor::new("a", &events))
            .unwrap()
            .install_default(RecordingDescriptor::new("b", &events).failing_close())
            .unwrap()
            .build()
            .await
            .unwrap();

        let tasks: Vec<_> = (0..16)
            .map(|_| {
                let client = client.clone();
                tokio::spawn(async move { client.close().await })
            })
            .collect();

        let mut teardown_errors = 0;
        for task in tasks {
            match task.await.unwrap() {
                Ok(()) => {}
                Err(Error::Teardown(failures)) => {
                    assert!(failures.contains("b"));
                    teardown_errors += 1;
                }
                Err(other) => panic!("unexpected error: {other}"),
            }
        }

        assert_eq!(teardown_errors, 1);
        assert_eq!(events.close_count("a"), 1);
        assert_eq!(events.close_count("b"), 1);
        assert_eq!(engine.close_count(), 1);
        assert!(client.is_closed());
    }
}
