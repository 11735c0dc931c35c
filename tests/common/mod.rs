//! Common test utilities for E2E tests

#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use postdeck::analytics::{AnalyticsMetric, AnalyticsPoint, AnalyticsSource};
use postdeck::auth::token::{issue_sso_token, issue_token};
use postdeck::data::{
    CacheStore, Database, EntityId, INTEGRATION_TYPE_SOCIAL, Integration, MemoryCache, Membership,
    Organization, Post, Role, User,
};
use postdeck::error::AppError;
use postdeck::{AppState, config};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tempfile::TempDir;
use tokio::net::TcpListener;

pub const JWT_SECRET: &str = "test-jwt-secret-that-is-at-least-32-bytes";
pub const INTERNAL_ROLE: &str = "system-internal";

/// Scripted analytics source
///
/// Integrations without a script return no metrics.
#[derive(Default)]
pub struct FakeAnalytics {
    scripts: Mutex<HashMap<String, Result<Vec<AnalyticsMetric>, String>>>,
    calls: AtomicUsize,
    windows: Mutex<Vec<u32>>,
}

impl FakeAnalytics {
    pub fn set_metrics(&self, integration_id: &str, metrics: Vec<AnalyticsMetric>) {
        self.scripts
            .lock()
            .unwrap()
            .insert(integration_id.to_string(), Ok(metrics));
    }

    pub fn fail(&self, integration_id: &str) {
        self.scripts
            .lock()
            .unwrap()
            .insert(integration_id.to_string(), Err("gateway exploded".to_string()));
    }

    /// Number of fetches made so far
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// `days` argument of every fetch, in call order
    pub fn windows(&self) -> Vec<u32> {
        self.windows.lock().unwrap().clone()
    }
}

#[async_trait]
impl AnalyticsSource for FakeAnalytics {
    async fn fetch(
        &self,
        _organization_id: &str,
        integration: &Integration,
        days: u32,
    ) -> Result<Vec<AnalyticsMetric>, AppError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.windows.lock().unwrap().push(days);
        let script = self.scripts.lock().unwrap().get(&integration.id).cloned();

        match script {
            Some(Ok(metrics)) => Ok(metrics),
            Some(Err(message)) => Err(AppError::Upstream(message)),
            None => Ok(Vec::new()),
        }
    }
}

/// Build a metric series from `(date, total)` pairs
pub fn metric(label: &str, points: &[(&str, serde_json::Value)]) -> AnalyticsMetric {
    AnalyticsMetric {
        label: label.to_string(),
        data: points
            .iter()
            .map(|(date, total)| AnalyticsPoint {
                date: date.to_string(),
                total: Some(total.clone()),
            })
            .collect(),
    }
}

/// A seeded user with their own organization
pub struct SeededUser {
    pub user: User,
    pub organization: Organization,
    pub membership: Membership,
}

/// Test server instance
pub struct TestServer {
    pub addr: String,
    pub state: AppState,
    pub analytics: Arc<FakeAnalytics>,
    pub _temp_dir: TempDir,
    pub client: reqwest::Client,
}

pub fn test_config(db_path: std::path::PathBuf, sso_base_url: Option<String>) -> config::AppConfig {
    config::AppConfig {
        environment: config::RuntimeEnvironment::Development,
        server: config::ServerConfig {
            host: "127.0.0.1".to_string(),
            port: 0,
            domain: "localhost".to_string(),
            protocol: "http".to_string(),
        },
        database: config::DatabaseConfig { path: db_path },
        auth: config::AuthConfig {
            jwt_secret: JWT_SECRET.to_string(),
            internal_role: INTERNAL_ROLE.to_string(),
        },
        sso: config::SsoConfig {
            base_url: sso_base_url,
            password_hash: String::new(),
            timeout_seconds: 5,
        },
        analytics: config::AnalyticsConfig {
            base_url: None,
            timeout_seconds: 5,
        },
        cache: config::CacheConfig {
            backend: config::CacheBackend::Memory,
            redis_url: None,
            ttl_seconds: Some(300),
            max_entries: 1000,
        },
        logging: config::LoggingConfig {
            level: "info".to_string(),
            format: "pretty".to_string(),
        },
    }
}

impl TestServer {
    /// Create a new test server instance
    pub async fn new() -> Self {
        Self::with_sso(None).await
    }

    /// Create a test server whose SSO client points at `sso_base_url`
    pub async fn with_sso(sso_base_url: Option<String>) -> Self {
        postdeck::metrics::init_metrics();

        // Create temporary directory for test database
        let temp_dir = TempDir::new().unwrap();
        let db_path = temp_dir.path().join("test.db");
        let config = test_config(db_path.clone(), sso_base_url);

        let db = Arc::new(Database::connect(&db_path).await.unwrap());
        let cache: Arc<dyn CacheStore> = Arc::new(MemoryCache::new(config.cache.max_entries));
        let analytics = Arc::new(FakeAnalytics::default());

        let state = AppState::from_parts(
            config,
            db,
            cache,
            analytics.clone(),
            Arc::new(reqwest::Client::new()),
        );

        // Create HTTP client
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(10))
            .build()
            .unwrap();

        // Bind to random port
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let addr_str = format!("http://{}", addr);

        let app = postdeck::build_router(state.clone());

        // Spawn server in background
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        // Wait a bit for server to start
        tokio::time::sleep(tokio::time::Duration::from_millis(100)).await;

        Self {
            addr: addr_str,
            state,
            analytics,
            _temp_dir: temp_dir,
            client,
        }
    }

    /// Get base URL for API requests
    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.addr, path)
    }

    /// Create a user with their own organization and ADMIN membership
    pub async fn seed_user(&self, email: &str, activated: bool, super_admin: bool) -> SeededUser {
        let now = Utc::now();
        let user = User {
            id: EntityId::new().0,
            email: email.to_string(),
            name: None,
            password: Some("hashed-password".to_string()),
            activated,
            is_super_admin: super_admin,
            created_at: now,
        };
        self.state.db.insert_user(&user).await.unwrap();

        let organization = Organization {
            id: EntityId::new().0,
            name: format!("{email} org"),
            api_key: None,
            created_at: now,
        };
        self.state.db.insert_organization(&organization).await.unwrap();

        let membership = self.add_membership(&user.id, &organization.id, false).await;

        SeededUser {
            user,
            organization,
            membership,
        }
    }

    /// Add a user to an extra organization
    pub async fn add_membership(
        &self,
        user_id: &str,
        organization_id: &str,
        disabled: bool,
    ) -> Membership {
        let membership = Membership {
            id: EntityId::new().0,
            user_id: user_id.to_string(),
            organization_id: organization_id.to_string(),
            role: Role::Admin,
            disabled,
            created_at: Utc::now(),
        };
        self.state.db.insert_membership(&membership).await.unwrap();
        membership
    }

    /// Create an extra organization without members
    pub async fn seed_organization(&self, name: &str) -> Organization {
        let organization = Organization {
            id: EntityId::new().0,
            name: name.to_string(),
            api_key: None,
            created_at: Utc::now(),
        };
        self.state.db.insert_organization(&organization).await.unwrap();
        organization
    }

    /// Create an enabled social integration
    pub async fn add_integration(&self, organization_id: &str, provider: &str) -> Integration {
        let integration = Integration {
            id: EntityId::new().0,
            organization_id: organization_id.to_string(),
            name: format!("{provider} channel"),
            provider_identifier: provider.to_string(),
            integration_type: INTEGRATION_TYPE_SOCIAL.to_string(),
            disabled: false,
            deleted_at: None,
            created_at: Utc::now(),
        };
        self.state.db.insert_integration(&integration).await.unwrap();
        integration
    }

    /// Create a post published at `publish_date`
    pub async fn add_post(
        &self,
        organization_id: &str,
        integration_id: Option<&str>,
        publish_date: Option<DateTime<Utc>>,
    ) -> Post {
        let post = Post {
            id: EntityId::new().0,
            organization_id: organization_id.to_string(),
            integration_id: integration_id.map(ToOwned::to_owned),
            content: "hello world".to_string(),
            publish_date,
            deleted_at: None,
            created_at: Utc::now(),
        };
        self.state.db.insert_post(&post).await.unwrap();
        post
    }

    /// SSO token for `subject`, valid for an hour
    pub fn sso_token(&self, subject: &str, email: Option<&str>) -> String {
        issue_sso_token(subject, email, &[], Duration::hours(1), JWT_SECRET).unwrap()
    }

    /// Service-to-service token carrying `roles`
    pub fn service_token(&self, roles: &[&str]) -> String {
        issue_sso_token("sso-service", None, roles, Duration::minutes(5), JWT_SECRET).unwrap()
    }

    /// Legacy session token embedding the user object
    pub fn legacy_token(&self, user: &User) -> String {
        issue_token(user, JWT_SECRET).unwrap()
    }

    /// GET `path` with a bearer token
    pub async fn get_authed(&self, path: &str, token: &str) -> reqwest::Response {
        self.client
            .get(self.url(path))
            .bearer_auth(token)
            .send()
            .await
            .unwrap()
    }
}
