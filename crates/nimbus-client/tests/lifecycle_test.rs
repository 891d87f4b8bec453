//! Client lifecycle against a mock backend

use nimbus_client::prelude::*;
use nimbus_client::ClientHandle;
use nimbus_transport::TransportRequest;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

#[derive(Debug, Default)]
struct StorageConfig {
    bucket: String,
}

#[derive(Debug)]
struct Storage {
    client: ClientHandle,
    bucket: String,
    closed: Arc<AtomicUsize>,
}

impl Storage {
    async fn list(&self) -> Result<serde_json::Value> {
        let client = self.client.upgrade()?;
        let response = client
            .transport()
            .execute(TransportRequest::get(format!("storage/v1/object/list/{}", self.bucket)))
            .await?
            .error_for_status()?;
        response.json()
    }
}

#[async_trait]
impl Plugin for Storage {
    async fn close(&self) -> PluginResult<()> {
        self.closed.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

struct StorageDescriptor {
    closed: Arc<AtomicUsize>,
}

impl PluginDescriptor for StorageDescriptor {
    type Config = StorageConfig;
    type Plugin = Storage;

    fn key(&self) -> PluginKey {
        PluginKey::from_static("storage")
    }

    fn validate_config(&self, config: &StorageConfig) -> PluginResult<()> {
        if config.bucket.is_empty() {
            return Err(PluginError::config("bucket is required"));
        }
        Ok(())
    }

    fn create(&self, client: ClientHandle, config: StorageConfig) -> PluginResult<Storage> {
        Ok(Storage {
            client,
            bucket: config.bucket,
            closed: self.closed.clone(),
        })
    }
}

async fn build_client(server: &MockServer, closed: &Arc<AtomicUsize>) -> NimbusClient {
    let host = server.uri().trim_start_matches("http://").to_string();

    NimbusClient::builder(host, "anon-key")
        .use_https(false)
        .install(
            StorageDescriptor {
                closed: closed.clone(),
            },
            |c| c.bucket = "avatars".to_string(),
        )
        .unwrap()
        .build()
        .await
        .unwrap()
}

#[tokio::test]
async fn test_plugin_uses_client_transport() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/storage/v1/object/list/avatars"))
        .and(header("apikey", "anon-key"))
        .and(header("authorization", "Bearer anon-key"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([{"name": "a.png"}])))
        .expect(1)
        .mount(&server)
        .await;

    let closed = Arc::new(AtomicUsize::new(0));
    let client = build_client(&server, &closed).await;

    let storage = client
        .plugin(&StorageDescriptor {
            closed: closed.clone(),
        })
        .unwrap();
    let objects = storage.list().await.unwrap();
    assert_eq!(objects[0]["name"], "a.png");

    client.close().await.unwrap();
}

#[tokio::test]
async fn test_close_is_idempotent() {
    let server = MockServer::start().await;
    let closed = Arc::new(AtomicUsize::new(0));
    let client = build_client(&server, &closed).await;

    client.close().await.unwrap();
    client.clone().close().await.unwrap();

    assert_eq!(closed.load(Ordering::SeqCst), 1);
    assert!(client.is_closed());
}

#[tokio::test]
async fn test_calls_after_close_fail() {
    let server = MockServer::start().await;
    let closed = Arc::new(AtomicUsize::new(0));
    let client = build_client(&server, &closed).await;

    let storage = client
        .plugins()
        .unwrap()
        .get_by_key::<Storage>("storage")
        .unwrap();

    client.close().await.unwrap();

    let err = storage.list().await.unwrap_err();
    assert!(matches!(err, Error::ClientClosed));
}

#[tokio::test]
async fn test_http_error_surfaces() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(404).set_body_string("bucket not found"))
        .mount(&server)
        .await;

    let closed = Arc::new(AtomicUsize::new(0));
    let client = build_client(&server, &closed).await;
    let storage = client
        .plugins()
        .unwrap()
        .get_by_key::<Storage>("storage")
        .unwrap();

    let err = storage.list().await.unwrap_err();
    assert!(matches!(err, Error::Http { status, .. } if status.as_u16() == 404));
}

#[tokio::test]
async fn test_invalid_plugin_config() {
    let closed = Arc::new(AtomicUsize::new(0));
    let err = NimbusClient::builder("abc.nimbus.dev", "anon-key")
        .install_default(StorageDescriptor { closed })
        .unwrap_err();

    assert!(err.is_configuration());
    assert_eq!(err.plugin_key().map(PluginKey::as_str), Some("storage"));
}
