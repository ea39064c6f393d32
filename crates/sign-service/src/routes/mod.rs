//! HTTP routes for the sign service.
//!
//! Defines the Axum router and application state.

use crate::auth::jwks::{HttpKeySetSource, KeySetCache, KeySetSource};
use crate::auth::jwt::TokenVerifier;
use crate::config::{Config, CorsOrigins};
use crate::content::existence::{ExistenceCache, ExistenceResolver};
use crate::content::links::{LinkIssuer, SignedLinkIssuer};
use crate::content::store::{ContentStore, HttpContentStore};
use crate::errors::SignError;
use crate::handlers;
use crate::middleware::{http_metrics_middleware, require_auth, AuthState};
use crate::resolver::decomposer::{KeyPatterns, WordDecomposer};
use crate::resolver::pipeline::{PipelineSettings, ResolutionPipeline};
use crate::services::recognition::{RecognitionClient, RecognitionService};
use axum::{
    error_handling::HandleErrorLayer,
    extract::DefaultBodyLimit,
    http::{header, HeaderValue},
    middleware,
    routing::{get, post},
    Router,
};
use metrics_exporter_prometheus::PrometheusHandle;
use std::sync::Arc;
use std::time::Duration;
use tower::ServiceBuilder;
use tower_http::{
    cors::{AllowHeaders, AllowMethods, AllowOrigin, CorsLayer},
    trace::TraceLayer,
};

/// Request timeout for every route.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(120);

/// Application state shared across all handlers.
#[derive(Clone)]
pub struct AppState {
    /// Service configuration.
    pub config: Config,

    /// Identity token verifier (owns the key-set cache).
    pub verifier: Arc<TokenVerifier>,

    /// Text-to-sign resolution.
    pub pipeline: Arc<ResolutionPipeline>,

    /// Sign-to-text recognition.
    pub recognition: Arc<dyn RecognitionService>,
}

/// External seams the application state is assembled from.
pub struct Backends {
    pub key_source: Arc<dyn KeySetSource>,
    pub store: Arc<dyn ContentStore>,
    pub links: Arc<dyn LinkIssuer>,
    pub recognition: Arc<dyn RecognitionService>,
}

impl Backends {
    /// HTTP-backed implementations from configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if a configured URL is unusable or an HTTP client
    /// cannot be built.
    pub fn from_config(config: &Config) -> Result<Self, SignError> {
        let key_source = Arc::new(HttpKeySetSource::new(
            config.idp_jwks_url.clone(),
            Duration::from_secs(config.jwks_fetch_timeout_seconds),
        ));
        let store = Arc::new(HttpContentStore::new(
            &config.content_store_url,
            Duration::from_secs(config.store_timeout_seconds),
        )?);
        let links = Arc::new(SignedLinkIssuer::new(
            &config.content_public_url,
            &config.link_signing_secret,
        )?);
        let recognition = Arc::new(RecognitionClient::new(
            config.recognition_url.clone(),
            Duration::from_secs(config.recognition_timeout_seconds),
        )?);

        Ok(Self {
            key_source,
            store,
            links,
            recognition,
        })
    }
}

impl AppState {
    /// Assemble the state from configuration and backends.
    pub fn new(config: Config, backends: Backends) -> Self {
        let key_set = Arc::new(KeySetCache::new(
            backends.key_source,
            Duration::from_secs(config.jwks_cache_ttl_seconds),
            Duration::from_secs(config.jwks_fetch_timeout_seconds),
        ));
        let verifier = Arc::new(TokenVerifier::new(
            key_set,
            config.idp_issuer.clone(),
            config.idp_client_id.clone(),
            config.expected_token_use.clone(),
            Duration::from_secs(config.jwt_leeway_seconds),
        ));

        let store_timeout = Duration::from_secs(config.store_timeout_seconds);
        let resolver = Arc::new(ExistenceResolver::new(
            backends.store,
            ExistenceCache::new(
                config.existence_cache_capacity,
                Duration::from_secs(config.existence_cache_ttl_seconds),
            ),
            store_timeout,
        ));
        let decomposer = WordDecomposer::new(
            resolver,
            KeyPatterns {
                word: config.word_key_patterns.clone(),
                letter: config.letter_key_patterns.clone(),
            },
        );
        let pipeline = Arc::new(ResolutionPipeline::new(
            decomposer,
            backends.links,
            PipelineSettings {
                max_clips: config.max_returned_clips,
                link_expiry: Duration::from_secs(config.link_expiry_seconds),
                link_timeout: store_timeout,
            },
        ));

        Self {
            config,
            verifier,
            pipeline,
            recognition: backends.recognition,
        }
    }
}

/// CORS policy for browser clients.
///
/// Credentials are never allowed; `Content-Type` and `Authorization` are
/// exposed to scripts.
pub fn cors_layer(origins: &CorsOrigins) -> CorsLayer {
    let allow_origin = match origins {
        CorsOrigins::Any => AllowOrigin::any(),
        // Entries were validated as header values when the config loaded.
        CorsOrigins::List(list) => {
            AllowOrigin::list(list.iter().filter_map(|o| HeaderValue::from_str(o).ok()))
        }
    };

    CorsLayer::new()
        .allow_origin(allow_origin)
        .allow_methods(AllowMethods::any())
        .allow_headers(AllowHeaders::any())
        .expose_headers([header::CONTENT_TYPE, header::AUTHORIZATION])
}

/// Build the application routes.
///
/// Creates an Axum router with:
/// - `/health` - Liveness probe with the configured issuer - public
/// - `/ready` - Readiness probe (key set populated or fetchable) - public
/// - `/metrics` - Prometheus metrics endpoint - public
/// - `/api/v1/me` - Caller profile - requires authentication
/// - `/api/v1/text-to-sign` - Text resolution - requires authentication
/// - `/api/v1/sign-to-text` - Video recognition - requires authentication
/// - JSON 404/405 fallbacks
/// - Request timeout (JSON 408)
/// - TraceLayer for request logging
/// - CORS from `CORS_ORIGINS`
/// - HTTP metrics middleware
pub fn build_routes(state: Arc<AppState>, metrics_handle: PrometheusHandle) -> Router {
    let auth_state = Arc::new(AuthState {
        verifier: Arc::clone(&state.verifier),
    });
    let max_upload_bytes = state.config.max_upload_bytes;
    let cors = cors_layer(&state.config.cors_origins);

    let public_routes = Router::new()
        .route("/health", get(handlers::health_check))
        .route("/ready", get(handlers::readiness_check))
        .with_state(state.clone());

    let metrics_routes = Router::new()
        .route("/metrics", get(handlers::metrics_handler))
        .with_state(metrics_handle);

    let protected_routes = Router::new()
        .route("/api/v1/me", get(handlers::get_me))
        .route("/api/v1/text-to-sign", post(handlers::text_to_sign))
        .route(
            "/api/v1/sign-to-text",
            post(handlers::sign_to_text).layer(DefaultBodyLimit::max(max_upload_bytes)),
        )
        .route_layer(middleware::from_fn_with_state(auth_state, require_auth))
        .with_state(state);

    // Layer order (bottom-to-top execution):
    // 1. TraceLayer - Log request details (innermost)
    // 2. Timeout - Elapsed requests become a JSON 408
    // 3. CorsLayer - Answer preflights before auth runs
    // 4. http_metrics_middleware - Record ALL responses (outermost)
    public_routes
        .merge(metrics_routes)
        .merge(protected_routes)
        .fallback(handlers::not_found)
        .method_not_allowed_fallback(handlers::method_not_allowed)
        .layer(TraceLayer::new_for_http())
        .layer(
            ServiceBuilder::new()
                .layer(HandleErrorLayer::new(handlers::handle_timeout_error))
                .timeout(REQUEST_TIMEOUT),
        )
        .layer(cors)
        .layer(middleware::from_fn(http_metrics_middleware))
}
