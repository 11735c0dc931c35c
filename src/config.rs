//! Configuration management
//!
//! Loads configuration from:
//! 1. Default values
//! 2. Configuration file (config/local.toml)
//! 3. Environment variables (override)

use serde::Deserialize;
use std::{net::IpAddr, path::PathBuf, time::Duration};

/// Main application configuration
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub environment: RuntimeEnvironment,
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub auth: AuthConfig,
    pub sso: SsoConfig,
    pub analytics: AnalyticsConfig,
    pub cache: CacheConfig,
    pub logging: LoggingConfig,
}

/// Deployment environment
#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum RuntimeEnvironment {
    #[default]
    Development,
    Production,
}

/// Server configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Bind address (e.g., "0.0.0.0")
    pub host: String,
    /// Port number (e.g., 8080)
    pub port: u16,
    /// Public domain (e.g., "app.example.com")
    pub domain: String,
    /// Protocol ("http" or "https")
    pub protocol: String,
}

impl ServerConfig {
    /// Get the base URL for the instance
    ///
    /// # Returns
    /// Full URL like "https://app.example.com"
    pub fn base_url(&self) -> String {
        format!("{}://{}", self.protocol, self.domain)
    }
}

/// Database configuration (SQLite only)
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    /// Path to SQLite database file
    pub path: PathBuf,
}

/// Token verification configuration
#[derive(Debug, Clone, Deserialize)]
pub struct AuthConfig {
    /// Shared HS256 secret used by both SSO and legacy session tokens (32+ bytes)
    pub jwt_secret: String,
    /// Role claim required on service-to-service tokens
    #[serde(default = "default_internal_role")]
    pub internal_role: String,
}

fn default_internal_role() -> String {
    "system-internal".to_string()
}

/// Upstream single sign-on service
#[derive(Debug, Clone, Deserialize)]
pub struct SsoConfig {
    /// Base URL of the SSO service, e.g. "https://sso.example.com/api"
    pub base_url: Option<String>,
    /// Optional pre-hash applied to passwords before transit: "", "sha1" or "md5"
    #[serde(default)]
    pub password_hash: String,
    /// Request timeout in seconds
    pub timeout_seconds: u64,
}

/// Per-integration analytics gateway
#[derive(Debug, Clone, Deserialize)]
pub struct AnalyticsConfig {
    /// Base URL of the analytics gateway
    pub base_url: Option<String>,
    /// Request timeout in seconds
    pub timeout_seconds: u64,
}

/// Cache backend selector
#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum CacheBackend {
    #[default]
    Memory,
    Redis,
}

/// Dashboard cache configuration
#[derive(Debug, Clone, Deserialize)]
pub struct CacheConfig {
    #[serde(default)]
    pub backend: CacheBackend,
    /// Redis connection URL, required when backend = "redis"
    pub redis_url: Option<String>,
    /// Explicit TTL override in seconds
    pub ttl_seconds: Option<u64>,
    /// Maximum entries held by the in-memory backend
    pub max_entries: u64,
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level: trace, debug, info, warn, error
    pub level: String,
    /// Log format: "pretty" or "json"
    pub format: String,
}

impl LoggingConfig {
    /// `EnvFilter` directive used when `RUST_LOG` is unset
    pub fn default_directive(&self) -> String {
        format!("postdeck={},tower_http=debug", self.level)
    }

    pub fn is_json(&self) -> bool {
        self.format.eq_ignore_ascii_case("json")
    }
}

const DEVELOPMENT_CACHE_TTL_SECS: u64 = 1;
const PRODUCTION_CACHE_TTL_SECS: u64 = 3600;

impl AppConfig {
    /// Load configuration from file and environment
    ///
    /// # Loading Order
    /// 1. Default values
    /// 2. config/default.toml (if exists)
    /// 3. config/local.toml (if exists)
    /// 4. Environment variables (POSTDECK__*)
    ///
    /// # Errors
    /// Returns error if configuration is invalid
    pub fn load() -> Result<Self, crate::error::AppError> {
        use config::{Config, Environment, File};

        let config = Config::builder()
            // Start with default values
            .set_default("environment", "development")?
            .set_default("server.host", "127.0.0.1")?
            .set_default("server.port", 8080)?
            .set_default("server.domain", "localhost")?
            .set_default("server.protocol", "http")?
            .set_default("database.path", "data/postdeck.db")?
            .set_default("auth.internal_role", "system-internal")?
            .set_default("sso.password_hash", "")?
            .set_default("sso.timeout_seconds", 15)?
            .set_default("analytics.timeout_seconds", 30)?
            .set_default("cache.backend", "memory")?
            .set_default("cache.max_entries", 10_000)?
            .set_default("logging.level", "info")?
            .set_default("logging.format", "pretty")?
            // Load from config/default.toml if it exists
            .add_source(File::with_name("config/default").required(false))
            // Load from config/local.toml if it exists (overrides default)
            .add_source(File::with_name("config/local").required(false))
            // Load from environment variables (POSTDECK__*)
            .add_source(
                Environment::with_prefix("POSTDECK")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .map_err(|e| crate::error::AppError::Config(e.to_string()))?;

        let app_config: Self = config
            .try_deserialize()
            .map_err(|e| crate::error::AppError::Config(e.to_string()))?;
        app_config.validate()?;
        Ok(app_config)
    }

    /// Time-to-live for cached dashboard results
    ///
    /// Development keeps entries for a single second so edits show up
    /// immediately; production keeps them for an hour.
    pub fn dashboard_cache_ttl(&self) -> Duration {
        let secs = self.cache.ttl_seconds.unwrap_or(match self.environment {
            RuntimeEnvironment::Development => DEVELOPMENT_CACHE_TTL_SECS,
            RuntimeEnvironment::Production => PRODUCTION_CACHE_TTL_SECS,
        });
        Duration::from_secs(secs.max(1))
    }

    pub fn should_use_secure_cookies(&self) -> bool {
        self.server.protocol.eq_ignore_ascii_case("https")
            || !is_local_server_domain(&self.server.domain)
    }

    fn validate(&self) -> Result<(), crate::error::AppError> {
        const MIN_JWT_SECRET_BYTES: usize = 32;

        if self.auth.jwt_secret.as_bytes().len() < MIN_JWT_SECRET_BYTES {
            return Err(crate::error::AppError::Config(format!(
                "auth.jwt_secret must be at least {} bytes",
                MIN_JWT_SECRET_BYTES
            )));
        }

        if self.auth.internal_role.trim().is_empty() {
            return Err(crate::error::AppError::Config(
                "auth.internal_role must not be empty".to_string(),
            ));
        }

        if self.cache.backend == CacheBackend::Redis
            && self
                .cache
                .redis_url
                .as_deref()
                .map(str::trim)
                .is_none_or(str::is_empty)
        {
            return Err(crate::error::AppError::Config(
                "cache.redis_url is required when cache.backend=redis".to_string(),
            ));
        }

        if !matches!(self.sso.password_hash.as_str(), "" | "sha1" | "md5") {
            return Err(crate::error::AppError::Config(format!(
                "sso.password_hash must be one of \"\", \"sha1\", \"md5\" (got {:?})",
                self.sso.password_hash
            )));
        }

        if !self.should_use_secure_cookies() {
            let host = normalized_server_host(&self.server.domain);
            tracing::warn!(
                host = %host,
                protocol = %self.server.protocol,
                "Using insecure auth cookies for local development"
            );
        } else if !self.server.protocol.eq_ignore_ascii_case("https") {
            return Err(crate::error::AppError::Config(
                "server.protocol must be https for non-local server domains".to_string(),
            ));
        }

        Ok(())
    }
}

fn normalized_server_host(domain: &str) -> String {
    let trimmed = domain.trim();
    let parsed_host = url::Url::parse(&format!("http://{trimmed}"))
        .ok()
        .and_then(|url| url.host_str().map(|host| host.to_string()));
    let host = parsed_host.unwrap_or_else(|| trimmed.to_string());
    host.trim_end_matches('.').to_ascii_lowercase()
}

fn is_local_server_domain(domain: &str) -> bool {
    let host = normalized_server_host(domain);
    if host == "localhost" || host.ends_with(".localhost") {
        return true;
    }

    if let Ok(ip) = host.parse::<IpAddr>() {
        return ip.is_loopback() || ip.is_unspecified();
    }

    false
}
