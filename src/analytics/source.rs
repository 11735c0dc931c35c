//! Per-integration analytics source
//!
//! The dashboard never talks to social platforms itself. Each integration's
//! metrics are fetched from an analytics gateway that already normalizes the
//! platform responses into labelled series of `{date, total}` points.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;

use crate::data::Integration;
use crate::error::AppError;

/// One labelled time series returned for an integration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalyticsMetric {
    pub label: String,
    #[serde(default)]
    pub data: Vec<AnalyticsPoint>,
}

/// A single data point
///
/// `total` is kept as raw JSON: providers send numbers, numeric strings,
/// `null`, or omit it entirely.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalyticsPoint {
    #[serde(default)]
    pub date: String,
    #[serde(default)]
    pub total: Option<Value>,
}

impl AnalyticsPoint {
    /// Numeric value of the point; anything that is not a finite number counts as 0
    pub fn total_value(&self) -> f64 {
        let value = match &self.total {
            Some(Value::Number(n)) => n.as_f64().unwrap_or(0.0),
            Some(Value::String(s)) => s.trim().parse::<f64>().unwrap_or(0.0),
            _ => 0.0,
        };

        if value.is_finite() { value } else { 0.0 }
    }
}

impl AnalyticsMetric {
    /// Sum of all point totals
    pub fn total(&self) -> f64 {
        self.data.iter().map(AnalyticsPoint::total_value).sum()
    }
}

/// Fetches analytics series for one integration
#[async_trait]
pub trait AnalyticsSource: Send + Sync {
    /// Fetch the last `days` days of metrics for an integration
    async fn fetch(
        &self,
        organization_id: &str,
        integration: &Integration,
        days: u32,
    ) -> Result<Vec<AnalyticsMetric>, AppError>;
}

/// Analytics gateway reached over HTTP
pub struct HttpAnalyticsSource {
    http_client: Arc<reqwest::Client>,
    base_url: Option<String>,
    timeout: Duration,
}

impl HttpAnalyticsSource {
    /// Create new HTTP analytics source
    ///
    /// # Arguments
    /// * `http_client` - Shared HTTP client
    /// * `base_url` - Gateway base URL; fetches fail with a configuration error when unset
    /// * `timeout` - Per-request timeout
    pub fn new(
        http_client: Arc<reqwest::Client>,
        base_url: Option<String>,
        timeout: Duration,
    ) -> Self {
        Self {
            http_client,
            base_url: base_url.map(|url| url.trim_end_matches('/').to_string()),
            timeout,
        }
    }

    fn base_url(&self) -> Result<&str, AppError> {
        self.base_url
            .as_deref()
            .filter(|url| !url.is_empty())
            .ok_or_else(|| AppError::Config("analytics.base_url is not configured".to_string()))
    }
}

#[async_trait]
impl AnalyticsSource for HttpAnalyticsSource {
    async fn fetch(
        &self,
        organization_id: &str,
        integration: &Integration,
        days: u32,
    ) -> Result<Vec<AnalyticsMetric>, AppError> {
        let url = format!(
            "{}/integrations/{}/analytics?days={}",
            self.base_url()?,
            urlencoding::encode(&integration.id),
            days
        );

        let response = self
            .http_client
            .get(&url)
            .header("Accept", "application/json")
            .header("x-organization-id", organization_id)
            .timeout(self.timeout)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(AppError::Upstream(format!(
                "Analytics fetch for integration {} failed: HTTP {}",
                integration.id,
                response.status()
            )));
        }

        let metrics: Vec<AnalyticsMetric> = response.json().await?;
        Ok(metrics)
    }
}
