//! Single sign-on upstream client
//!
//! Registration, login, token refresh and logout are proxied to the SSO
//! service. Passwords can be pre-hashed before they leave this process.

use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use sha1::{Digest, Sha1};
use std::sync::Arc;
use std::time::Duration;

use crate::error::AppError;

/// Pre-hash applied to passwords before they are sent upstream
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PasswordScheme {
    #[default]
    Plain,
    Sha1,
    Md5,
}

impl PasswordScheme {
    /// Parse the `sso.password_hash` setting; unknown values mean plain
    pub fn from_config(value: &str) -> Self {
        match value {
            "sha1" => PasswordScheme::Sha1,
            "md5" => PasswordScheme::Md5,
            _ => PasswordScheme::Plain,
        }
    }

    /// Wrap a password, hex-encoding the digest
    pub fn wrap(self, password: &str) -> String {
        match self {
            PasswordScheme::Plain => password.to_string(),
            PasswordScheme::Sha1 => format!("{:x}", Sha1::digest(password.as_bytes())),
            PasswordScheme::Md5 => format!("{:x}", md5::compute(password.as_bytes())),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SsoAccessData {
    pub access_token: String,
    #[serde(default)]
    pub expires_at: i64,
    #[serde(default)]
    pub token_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SsoUser {
    pub id: String,
    #[serde(default)]
    pub email: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
}

/// Successful SSO token response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SsoTokenResponse {
    pub success: bool,
    pub access_data: SsoAccessData,
    pub user: SsoUser,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// HTTP client for the SSO service
pub struct SsoClient {
    http_client: Arc<reqwest::Client>,
    base_url: Option<String>,
    password_scheme: PasswordScheme,
    timeout: Duration,
}

impl SsoClient {
    /// Create new SSO client
    ///
    /// # Arguments
    /// * `base_url` - SSO API base URL; calls fail with a configuration error when unset
    /// * `password_scheme` - Pre-hash for passwords in register/login
    pub fn new(
        http_client: Arc<reqwest::Client>,
        base_url: Option<String>,
        password_scheme: PasswordScheme,
        timeout: Duration,
    ) -> Self {
        Self {
            http_client,
            base_url: base_url.map(|url| url.trim_end_matches('/').to_string()),
            password_scheme,
            timeout,
        }
    }

    fn endpoint(&self, path: &str) -> Result<String, AppError> {
        let base = self
            .base_url
            .as_deref()
            .filter(|url| !url.is_empty())
            .ok_or_else(|| AppError::Config("sso.base_url is not configured".to_string()))?;
        Ok(format!("{}/{}", base, path))
    }

    /// Register a new account
    pub async fn register(
        &self,
        email: &str,
        password: &str,
        vcode: &str,
        username: Option<&str>,
    ) -> Result<SsoTokenResponse, AppError> {
        tracing::info!(email = %email, "Proxying registration to SSO");
        let body = json!({
            "email": email,
            "password": self.password_scheme.wrap(password),
            "vcode": vcode,
            "username": username,
        });
        self.post_token_request("register", "Registration", body).await
    }

    /// Exchange credentials for tokens
    pub async fn login(&self, email: &str, password: &str) -> Result<SsoTokenResponse, AppError> {
        tracing::info!(email = %email, "Proxying login to SSO");
        let body = json!({
            "email": email,
            "password": self.password_scheme.wrap(password),
        });
        self.post_token_request("login", "Login", body).await
    }

    /// Exchange a refresh token for a new access token
    pub async fn refresh_token(&self, refresh_token: &str) -> Result<SsoTokenResponse, AppError> {
        tracing::info!("Refreshing token via SSO");
        let body = json!({ "refresh_token": refresh_token });
        self.post_token_request("token-refresh", "Token refresh", body)
            .await
    }

    /// Revoke a refresh token
    ///
    /// Best effort: failures are logged and otherwise ignored.
    pub async fn logout(&self, refresh_token: &str) {
        tracing::info!("Logging out via SSO");

        let url = match self.endpoint("logout") {
            Ok(url) => url,
            Err(e) => {
                tracing::warn!(error = %e, "Logout call to SSO skipped");
                return;
            }
        };

        let result = self
            .http_client
            .post(&url)
            .header("Content-Type", "application/json")
            .header("Cookie", format!("refresh_token={}", refresh_token))
            .timeout(self.timeout)
            .send()
            .await;

        match result {
            Ok(response) if !response.status().is_success() => {
                tracing::warn!(status = %response.status(), "Logout call to SSO failed");
            }
            Ok(_) => {}
            Err(e) => tracing::warn!(error = %e, "Logout call to SSO failed"),
        }
    }

    async fn post_token_request(
        &self,
        path: &str,
        operation: &str,
        body: Value,
    ) -> Result<SsoTokenResponse, AppError> {
        let url = self.endpoint(path)?;

        let response = self
            .http_client
            .post(&url)
            .json(&body)
            .timeout(self.timeout)
            .send()
            .await?;

        let status = response.status();
        let data: Value = response.json().await.unwrap_or(Value::Null);
        let succeeded = data.get("success").and_then(Value::as_bool).unwrap_or(false);

        if !status.is_success() || !succeeded {
            let detail = upstream_detail(&data)
                .unwrap_or_else(|| format!("{} failed at sso", operation));
            tracing::warn!(
                operation = %operation,
                status = %status,
                detail = %detail,
                "SSO request failed"
            );
            return Err(AppError::Upstream(detail));
        }

        serde_json::from_value(data).map_err(|e| {
            AppError::Upstream(format!("{} returned an unexpected response: {}", operation, e))
        })
    }
}

fn upstream_detail(data: &Value) -> Option<String> {
    ["detail", "message"].iter().find_map(|field| {
        data.get(*field)
            .and_then(Value::as_str)
            .filter(|s| !s.is_empty())
            .map(ToOwned::to_owned)
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn password_schemes() {
        assert_eq!(PasswordScheme::Plain.wrap("secret"), "secret");
        assert_eq!(
            PasswordScheme::Sha1.wrap("secret"),
            "e5e9fa1ba31ecd1ae84f75caaa474f3a663f05f4"
        );
        assert_eq!(
            PasswordScheme::Md5.wrap("secret"),
            "5ebe2294ecd0e0f08eab7690d2a6ee69"
        );
    }

    #[test]
    fn scheme_from_config() {
        assert_eq!(PasswordScheme::from_config("sha1"), PasswordScheme::Sha1);
        assert_eq!(PasswordScheme::from_config("md5"), PasswordScheme::Md5);
        assert_eq!(PasswordScheme::from_config(""), PasswordScheme::Plain);
    }

    #[test]
    fn detail_prefers_detail_over_message() {
        assert_eq!(
            upstream_detail(&json!({"detail": "bad code", "message": "nope"})).as_deref(),
            Some("bad code")
        );
        assert_eq!(
            upstream_detail(&json!({"message": "nope"})).as_deref(),
            Some("nope")
        );
        assert_eq!(upstream_detail(&Value::Null), None);
    }

    #[tokio::test]
    async fn missing_base_url_fails_fast() {
        let client = SsoClient::new(
            Arc::new(reqwest::Client::new()),
            None,
            PasswordScheme::Plain,
            Duration::from_secs(1),
        );

        let error = client.login("a@example.com", "pw").await.unwrap_err();
        assert!(matches!(error, AppError::Config(_)));
    }
}
