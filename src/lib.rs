//! Postdeck - dashboard analytics and authentication backend for a social
//! media scheduling service
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      API Layer (Axum)                        │
//! │  - Dashboard endpoints                                      │
//! │  - Internal provisioning endpoint                           │
//! │  - SSO auth proxies                                         │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//! ┌─────────────────────────────────────────────────────────────┐
//! │                 Auth + Service Layer                         │
//! │  - Token verification, org selection, impersonation         │
//! │  - Dashboard aggregation with cache-aside                   │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      Data Layer                              │
//! │  - SQLite (sqlx)                                            │
//! │  - Result cache (moka or Redis)                             │
//! │  - Analytics gateway (HTTP)                                 │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Modules
//!
//! - `api`: HTTP handlers
//! - `auth`: Token verification, request authentication, SSO client
//! - `service`: Business logic layer
//! - `analytics`: Metric classification, period bucketing, analytics source
//! - `data`: Database and cache layer
//! - `config`: Configuration management
//! - `error`: Error types

pub mod analytics;
pub mod api;
pub mod auth;
pub mod config;
pub mod data;
pub mod error;
pub mod metrics;
pub mod service;

use std::sync::Arc;
use std::time::Duration;

/// Application state shared across all handlers
///
/// This struct is cloned for each request. The cache, analytics source and
/// HTTP client are owned by the services built from them.
#[derive(Clone)]
pub struct AppState {
    /// Application configuration
    pub config: Arc<config::AppConfig>,

    /// Database connection pool
    pub db: Arc<data::Database>,

    /// SSO upstream client
    pub sso: Arc<auth::SsoClient>,

    pub organizations: Arc<service::OrganizationService>,
    pub dashboard: Arc<service::DashboardService>,
    pub auth: Arc<auth::AuthResolver>,
}

impl AppState {
    /// Initialize application state
    ///
    /// # Steps
    /// 1. Connect to SQLite database
    /// 2. Initialize the cache backend
    /// 3. Build the HTTP client and upstream clients
    ///
    /// # Errors
    /// Returns error if any initialization step fails
    pub async fn new(config: config::AppConfig) -> Result<Self, error::AppError> {
        tracing::info!("Initializing application state...");

        // 1. Connect to SQLite database
        let db = data::Database::connect(&config.database.path).await?;
        tracing::info!("Database connected");

        // 2. Initialize cache
        let cache: Arc<dyn data::CacheStore> = match config.cache.backend {
            config::CacheBackend::Memory => {
                Arc::new(data::MemoryCache::new(config.cache.max_entries))
            }
            config::CacheBackend::Redis => {
                let url = config.cache.redis_url.as_deref().ok_or_else(|| {
                    error::AppError::Config(
                        "cache.redis_url is required when cache.backend=redis".to_string(),
                    )
                })?;
                let redis = data::RedisCache::connect(url)
                    .await
                    .map_err(|e| error::AppError::Cache(e.to_string()))?;
                Arc::new(redis)
            }
        };
        tracing::info!(
            backend = ?config.cache.backend,
            ttl_secs = config.dashboard_cache_ttl().as_secs(),
            "Cache initialized"
        );

        // 3. Initialize HTTP client
        let http_client = reqwest::Client::builder()
            .user_agent(concat!("Postdeck/", env!("CARGO_PKG_VERSION")))
            .timeout(Duration::from_secs(60))
            .build()
            .map_err(|e| error::AppError::Internal(e.into()))?;
        let http_client = Arc::new(http_client);

        let analytics = Arc::new(analytics::HttpAnalyticsSource::new(
            http_client.clone(),
            config.analytics.base_url.clone(),
            Duration::from_secs(config.analytics.timeout_seconds),
        ));

        tracing::info!("Application state initialized successfully");

        Ok(Self::from_parts(config, Arc::new(db), cache, analytics, http_client))
    }

    /// Assemble state from already-initialized components
    ///
    /// Lets tests swap in an in-memory cache or a scripted analytics source.
    pub fn from_parts(
        config: config::AppConfig,
        db: Arc<data::Database>,
        cache: Arc<dyn data::CacheStore>,
        analytics: Arc<dyn analytics::AnalyticsSource>,
        http_client: Arc<reqwest::Client>,
    ) -> Self {
        let sso = Arc::new(auth::SsoClient::new(
            http_client,
            config.sso.base_url.clone(),
            auth::PasswordScheme::from_config(&config.sso.password_hash),
            Duration::from_secs(config.sso.timeout_seconds),
        ));

        let organizations = Arc::new(service::OrganizationService::new(db.clone()));
        let dashboard = Arc::new(service::DashboardService::new(
            db.clone(),
            cache,
            analytics,
            config.dashboard_cache_ttl(),
        ));
        let auth = Arc::new(auth::AuthResolver::new(
            organizations.clone(),
            config.auth.jwt_secret.clone(),
        ));

        Self {
            config: Arc::new(config),
            db,
            sso,
            organizations,
            dashboard,
            auth,
        }
    }
}

/// Build the Axum router with all routes.
///
/// This is shared by the binary and integration tests to keep route
/// composition consistent across environments.
pub fn build_router(state: AppState) -> axum::Router {
    use axum::Router;
    use tower_http::{compression::CompressionLayer, trace::TraceLayer};

    let cors_layer = build_cors_layer(&state.config.server);

    Router::new()
        .route("/health", axum::routing::get(health_check))
        .nest("/auth", api::auth_router())
        .nest("/dashboard", api::dashboard_router(state.clone()))
        .nest("/internal", api::internal_router(state.clone()))
        .layer(CompressionLayer::new())
        .layer(TraceLayer::new_for_http())
        .layer(cors_layer)
        .with_state(state)
        .merge(api::metrics_router())
}

fn build_cors_layer(server: &config::ServerConfig) -> tower_http::cors::CorsLayer {
    use axum::http::{HeaderName, HeaderValue, Method, header};
    use tower_http::cors::CorsLayer;

    let allowed_headers = [
        header::AUTHORIZATION,
        header::CONTENT_TYPE,
        HeaderName::from_static("auth"),
        HeaderName::from_static("showorg"),
        HeaderName::from_static("impersonate"),
    ];
    let allowed_methods = [Method::GET, Method::POST, Method::OPTIONS];

    if !server.protocol.eq_ignore_ascii_case("https") {
        return CorsLayer::very_permissive();
    }

    let allowed_origin = server.base_url();
    match HeaderValue::from_str(&allowed_origin) {
        Ok(origin) => CorsLayer::new()
            .allow_origin([origin])
            .allow_credentials(true)
            .allow_methods(allowed_methods)
            .allow_headers(allowed_headers)
            .expose_headers([HeaderName::from_static("logout")]),
        Err(error) => {
            tracing::error!(
                %error,
                origin = %allowed_origin,
                "Failed to parse CORS origin from server base URL; denying cross-origin requests"
            );
            CorsLayer::new()
                .allow_methods(allowed_methods)
                .allow_headers(allowed_headers)
        }
    }
}

async fn health_check() -> &'static str {
    "OK"
}
