//! Test server harness for E2E testing
//!
//! Provides `TestSignServer`, a real sign service bound to a random port.
//! The identity provider's key-set endpoint is a wiremock server publishing
//! the fixture keys, and the content store is an [`InMemoryContentStore`].

use crate::content_store::InMemoryContentStore;
use crate::crypto_fixtures::{jwks_document, TestSigningKey};
use crate::token_builders::{TEST_CLIENT_ID, TEST_ISSUER};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use sign_service::config::Config;
use sign_service::content::store::ContentStore;
use sign_service::observability::metrics::init_metrics_recorder;
use sign_service::routes::{self, AppState, Backends};
use sign_service::services::recognition::RecognitionService;
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::{Arc, OnceLock};
use tokio::task::JoinHandle;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Path the key set is served from on the mock identity provider.
pub const JWKS_PATH: &str = "/.well-known/jwks.json";

/// Base URL signed links are issued against.
pub const TEST_PUBLIC_URL: &str = "https://media.test";

/// Link signing secret the test server is configured with.
pub const TEST_LINK_SECRET: &str = "test-link-signing-secret-0123456789";

/// Process-wide metrics handle shared by every test server.
static TEST_METRICS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

/// The installed recorder's handle, or a standalone one if another
/// recorder already owns the global slot.
fn test_metrics_handle() -> PrometheusHandle {
    TEST_METRICS_HANDLE
        .get_or_init(|| {
            init_metrics_recorder()
                .unwrap_or_else(|_| PrometheusBuilder::new().build_recorder().handle())
        })
        .clone()
}

/// Builder for [`TestSignServer`].
pub struct TestSignServerBuilder {
    store: Arc<InMemoryContentStore>,
    recognition: Option<Arc<dyn RecognitionService>>,
    vars: HashMap<String, String>,
    publish_keys: bool,
}

impl TestSignServerBuilder {
    /// Content store the server resolves against.
    pub fn store(mut self, store: InMemoryContentStore) -> Self {
        self.store = Arc::new(store);
        self
    }

    /// Replace the HTTP recognition client.
    pub fn recognition(mut self, recognition: Arc<dyn RecognitionService>) -> Self {
        self.recognition = Some(recognition);
        self
    }

    /// Override one configuration variable.
    pub fn var(mut self, name: &str, value: impl Into<String>) -> Self {
        self.vars.insert(name.to_string(), value.into());
        self
    }

    /// Serve 503 from the key-set endpoint instead of the fixture keys.
    pub fn key_set_unavailable(mut self) -> Self {
        self.publish_keys = false;
        self
    }

    /// Start the mock identity provider and the sign service.
    pub async fn spawn(self) -> Result<TestSignServer, anyhow::Error> {
        let rsa_key = TestSigningKey::rsa("test-rsa-1")?;
        let ed25519_key = TestSigningKey::ed25519("test-ed25519-1", 1)?;

        let jwks_server = MockServer::start().await;
        let jwks_response = if self.publish_keys {
            ResponseTemplate::new(200).set_body_json(jwks_document(&[&rsa_key, &ed25519_key]))
        } else {
            ResponseTemplate::new(503)
        };
        Mock::given(method("GET"))
            .and(path(JWKS_PATH))
            .respond_with(jwks_response)
            .mount(&jwks_server)
            .await;

        let mut vars = HashMap::from([
            ("BIND_ADDRESS".to_string(), "127.0.0.1:0".to_string()),
            ("IDP_ISSUER".to_string(), TEST_ISSUER.to_string()),
            ("IDP_CLIENT_ID".to_string(), TEST_CLIENT_ID.to_string()),
            (
                "IDP_JWKS_URL".to_string(),
                format!("{}{}", jwks_server.uri(), JWKS_PATH),
            ),
            (
                "CONTENT_STORE_URL".to_string(),
                "http://content-store.test".to_string(),
            ),
            ("CONTENT_PUBLIC_URL".to_string(), TEST_PUBLIC_URL.to_string()),
            (
                "LINK_SIGNING_SECRET".to_string(),
                TEST_LINK_SECRET.to_string(),
            ),
            ("DRAIN_SECONDS".to_string(), "0".to_string()),
        ]);
        vars.extend(self.vars);

        let config = Config::from_vars(&vars)
            .map_err(|e| anyhow::anyhow!("Failed to create config: {}", e))?;

        let mut backends = Backends::from_config(&config)
            .map_err(|e| anyhow::anyhow!("Failed to create backends: {}", e))?;
        let store: Arc<dyn ContentStore> = self.store.clone();
        backends.store = store;
        if let Some(recognition) = self.recognition {
            backends.recognition = recognition;
        }

        let state = Arc::new(AppState::new(config.clone(), backends));

        let metrics_handle = test_metrics_handle();

        let app = routes::build_routes(state, metrics_handle);

        // Bind to random port
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .map_err(|e| anyhow::anyhow!("Failed to bind test server: {}", e))?;

        let addr = listener
            .local_addr()
            .map_err(|e| anyhow::anyhow!("Failed to get local address: {}", e))?;

        let handle = tokio::spawn(async move {
            let make_service = app.into_make_service_with_connect_info::<SocketAddr>();
            if let Err(e) = axum::serve(listener, make_service).await {
                eprintln!("Test server error: {}", e);
            }
        });

        Ok(TestSignServer {
            addr,
            config,
            store: self.store,
            jwks_server,
            rsa_key,
            ed25519_key,
            _handle: handle,
        })
    }
}

/// Test harness for spawning the sign service in E2E tests.
///
/// # Example
/// ```rust,ignore
/// #[tokio::test]
/// async fn test_health() -> anyhow::Result<()> {
///     let server = TestSignServer::spawn().await?;
///     let response = reqwest::get(format!("{}/health", server.url())).await?;
///     assert_eq!(response.status(), 200);
///     Ok(())
/// }
/// ```
pub struct TestSignServer {
    addr: SocketAddr,
    config: Config,
    store: Arc<InMemoryContentStore>,
    jwks_server: MockServer,
    rsa_key: TestSigningKey,
    ed25519_key: TestSigningKey,
    _handle: JoinHandle<()>,
}

impl TestSignServer {
    pub fn builder() -> TestSignServerBuilder {
        TestSignServerBuilder {
            store: Arc::new(InMemoryContentStore::new()),
            recognition: None,
            vars: HashMap::new(),
            publish_keys: true,
        }
    }

    /// Spawn with an empty content store and default configuration.
    pub async fn spawn() -> Result<Self, anyhow::Error> {
        Self::builder().spawn().await
    }

    /// Get the base URL of the test server.
    pub fn url(&self) -> String {
        format!("http://{}", self.addr)
    }

    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn store(&self) -> &InMemoryContentStore {
        &self.store
    }

    /// The mock identity provider (for asserting on key-set fetches).
    pub fn jwks_server(&self) -> &MockServer {
        &self.jwks_server
    }

    /// Published RS256 key.
    pub fn signing_key(&self) -> &TestSigningKey {
        &self.rsa_key
    }

    /// Published EdDSA key.
    pub fn ed25519_key(&self) -> &TestSigningKey {
        &self.ed25519_key
    }

    /// Number of key-set fetches the service has made.
    pub async fn jwks_fetches(&self) -> usize {
        self.jwks_server
            .received_requests()
            .await
            .map(|requests| requests.len())
            .unwrap_or(0)
    }
}

impl Drop for TestSignServer {
    fn drop(&mut self) {
        // Abort the HTTP server task so the port is released when the test ends.
        self._handle.abort();
    }
}
