//! Dashboard service
//!
//! Aggregates per-organization post counts and per-integration analytics into
//! the four dashboard views. Summary, traffics and impressions go through the
//! cache; the posts trend is computed from the database on every call.

use chrono::{Duration as ChronoDuration, Utc};
use futures::future::join_all;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::analytics::{
    AnalyticsMetric, AnalyticsSource, MetricKind, Period, parse_point_date,
};
use crate::data::{CacheStore, Database, Integration, PublishedPost, get_json, set_json};
use crate::error::AppError;
use crate::metrics::{
    ANALYTICS_FETCH_DURATION_SECONDS, ANALYTICS_FETCH_FAILURES_TOTAL, CACHE_HITS_TOTAL,
    CACHE_MISSES_TOTAL,
};

/// Analytics window fetched for every view; the period only changes bucketing
const ANALYTICS_WINDOW_DAYS: u32 = 30;

// =============================================================================
// Response types
// =============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DashboardSummary {
    pub post_count: i64,
    pub channel_count: i64,
    pub impressions_total: f64,
    pub traffics_total: f64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PostsTrendEntry {
    pub date: String,
    pub platform: String,
    pub count: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrafficEntry {
    pub platform: String,
    pub value: f64,
    pub percentage: f64,
    /// Period-over-period change; no baseline is tracked yet so this is always 0
    pub delta: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImpressionsEntry {
    pub date: String,
    pub impressions: f64,
}

// =============================================================================
// Cache keys
// =============================================================================

/// Cache key builder for dashboard results
pub struct DashboardCacheKey;

impl DashboardCacheKey {
    /// Format: dashboard:summary:{org_id}
    pub fn summary(organization_id: &str) -> String {
        format!("dashboard:summary:{}", organization_id)
    }

    /// Format: dashboard:traffics:{org_id}
    pub fn traffics(organization_id: &str) -> String {
        format!("dashboard:traffics:{}", organization_id)
    }

    /// Format: dashboard:impressions:{org_id}:{period}
    pub fn impressions(organization_id: &str, period: Period) -> String {
        format!("dashboard:impressions:{}:{}", organization_id, period)
    }
}

// =============================================================================
// Service
// =============================================================================

/// Analytics fetched for one integration
struct FetchedAnalytics<'a> {
    integration: &'a Integration,
    metrics: Vec<AnalyticsMetric>,
}

/// Dashboard service
pub struct DashboardService {
    db: Arc<Database>,
    cache: Arc<dyn CacheStore>,
    source: Arc<dyn AnalyticsSource>,
    ttl: Duration,
}

impl DashboardService {
    /// Create new dashboard service
    ///
    /// # Arguments
    /// * `ttl` - Lifetime of cached summary/traffics/impressions results
    pub fn new(
        db: Arc<Database>,
        cache: Arc<dyn CacheStore>,
        source: Arc<dyn AnalyticsSource>,
        ttl: Duration,
    ) -> Self {
        Self {
            db,
            cache,
            source,
            ttl,
        }
    }

    /// Post count, channel count and 30-day impression/traffic totals
    pub async fn summary(&self, organization_id: &str) -> Result<DashboardSummary, AppError> {
        let key = DashboardCacheKey::summary(organization_id);
        self.cached("summary", &key, || async move {
            let (post_count, channel_count, integrations) = tokio::try_join!(
                self.db.count_posts(organization_id),
                self.db.count_channels(organization_id),
                self.db.get_active_integrations(organization_id),
            )?;

            let fetched = self
                .fetch_all(organization_id, &integrations, ANALYTICS_WINDOW_DAYS)
                .await;
            let (impressions_total, traffics_total) = sum_by_kind(&fetched);

            Ok(DashboardSummary {
                post_count,
                channel_count,
                impressions_total,
                traffics_total,
            })
        })
        .await
    }

    /// Published posts per (bucket, platform), uncached
    pub async fn posts_trend(
        &self,
        organization_id: &str,
        period: Period,
    ) -> Result<Vec<PostsTrendEntry>, AppError> {
        let since = Utc::now() - ChronoDuration::days(i64::from(period.lookback_days()));
        let posts = self
            .db
            .get_published_posts_since(organization_id, since)
            .await?;

        Ok(reduce_posts_trend(&posts, period))
    }

    /// Traffic totals per platform with their share of the grand total
    pub async fn traffics(&self, organization_id: &str) -> Result<Vec<TrafficEntry>, AppError> {
        let key = DashboardCacheKey::traffics(organization_id);
        self.cached("traffics", &key, || async move {
            let integrations = self.db.get_active_integrations(organization_id).await?;
            let fetched = self
                .fetch_all(organization_id, &integrations, ANALYTICS_WINDOW_DAYS)
                .await;
            Ok(reduce_traffics(&fetched))
        })
        .await
    }

    /// Impressions over the last 30 days, bucketed by each data point's own date
    pub async fn impressions(
        &self,
        organization_id: &str,
        period: Period,
    ) -> Result<Vec<ImpressionsEntry>, AppError> {
        let key = DashboardCacheKey::impressions(organization_id, period);
        self.cached("impressions", &key, || async move {
            let integrations = self.db.get_active_integrations(organization_id).await?;
            let fetched = self
                .fetch_all(organization_id, &integrations, ANALYTICS_WINDOW_DAYS)
                .await;
            Ok(reduce_impressions(&fetched, period))
        })
        .await
    }

    /// Cache-aside wrapper
    ///
    /// Cache read and write failures are logged and bypassed. Concurrent misses
    /// on the same key each recompute.
    async fn cached<T, F, Fut>(
        &self,
        query: &'static str,
        key: &str,
        compute: F,
    ) -> Result<T, AppError>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, AppError>>,
    {
        match get_json::<T>(self.cache.as_ref(), key).await {
            Ok(Some(value)) => {
                tracing::debug!(key = %key, "Dashboard cache hit");
                CACHE_HITS_TOTAL.with_label_values(&[query]).inc();
                return Ok(value);
            }
            Ok(None) => {}
            Err(e) => tracing::warn!(key = %key, error = %e, "Dashboard cache read failed"),
        }
        CACHE_MISSES_TOTAL.with_label_values(&[query]).inc();

        let value = compute().await?;

        if let Err(e) = set_json(self.cache.as_ref(), key, &value, self.ttl).await {
            tracing::warn!(key = %key, error = %e, "Dashboard cache write failed");
        }

        Ok(value)
    }

    /// Fetch analytics for every integration concurrently
    ///
    /// Failed integrations are logged and left out of the result.
    async fn fetch_all<'a>(
        &self,
        organization_id: &str,
        integrations: &'a [Integration],
        days: u32,
    ) -> Vec<FetchedAnalytics<'a>> {
        let fetches = integrations.iter().map(|integration| async move {
            let provider = integration.provider_identifier.as_str();
            let started = Instant::now();
            let result = self.source.fetch(organization_id, integration, days).await;
            ANALYTICS_FETCH_DURATION_SECONDS
                .with_label_values(&[provider])
                .observe(started.elapsed().as_secs_f64());

            match result {
                Ok(metrics) => Some(FetchedAnalytics {
                    integration,
                    metrics,
                }),
                Err(error) => {
                    tracing::warn!(
                        integration_id = %integration.id,
                        provider = %provider,
                        error = %error,
                        "Skipping integration with failed analytics fetch"
                    );
                    ANALYTICS_FETCH_FAILURES_TOTAL
                        .with_label_values(&[provider])
                        .inc();
                    None
                }
            }
        });

        join_all(fetches).await.into_iter().flatten().collect()
    }
}

// =============================================================================
// Reducers
// =============================================================================

/// Grand totals of impression and traffic metrics
fn sum_by_kind(fetched: &[FetchedAnalytics<'_>]) -> (f64, f64) {
    let mut impressions = 0.0;
    let mut traffic = 0.0;

    for metric in fetched.iter().flat_map(|f| &f.metrics) {
        match MetricKind::classify(&metric.label) {
            MetricKind::Impressions => impressions += metric.total(),
            MetricKind::Traffic => traffic += metric.total(),
            MetricKind::Unclassified => {}
        }
    }

    (impressions, traffic)
}

fn reduce_posts_trend(posts: &[PublishedPost], period: Period) -> Vec<PostsTrendEntry> {
    let mut buckets: BTreeMap<(String, String), u64> = BTreeMap::new();

    for post in posts {
        let date = period.bucket_key(post.publish_date);
        *buckets
            .entry((date, post.provider_identifier.clone()))
            .or_default() += 1;
    }

    buckets
        .into_iter()
        .map(|((date, platform), count)| PostsTrendEntry {
            date,
            platform,
            count,
        })
        .collect()
}

/// Share of `value` in `grand_total`, in percent with 2 decimals
fn percentage(value: f64, grand_total: f64) -> f64 {
    if grand_total > 0.0 {
        (value / grand_total * 10_000.0).round() / 100.0
    } else {
        0.0
    }
}

fn reduce_traffics(fetched: &[FetchedAnalytics<'_>]) -> Vec<TrafficEntry> {
    let mut per_platform: HashMap<&str, f64> = HashMap::new();

    for entry in fetched {
        for metric in &entry.metrics {
            if MetricKind::classify(&metric.label) == MetricKind::Traffic {
                *per_platform
                    .entry(entry.integration.provider_identifier.as_str())
                    .or_default() += metric.total();
            }
        }
    }

    let grand_total: f64 = per_platform.values().sum();

    let mut entries: Vec<TrafficEntry> = per_platform
        .into_iter()
        .map(|(platform, value)| TrafficEntry {
            platform: platform.to_string(),
            value,
            percentage: percentage(value, grand_total),
            delta: 0.0,
        })
        .collect();

    entries.sort_by(|a, b| {
        b.value
            .total_cmp(&a.value)
            .then_with(|| a.platform.cmp(&b.platform))
    });
    entries
}

fn reduce_impressions(fetched: &[FetchedAnalytics<'_>], period: Period) -> Vec<ImpressionsEntry> {
    let mut buckets: BTreeMap<String, f64> = BTreeMap::new();

    for metric in fetched.iter().flat_map(|f| &f.metrics) {
        if MetricKind::classify(&metric.label) != MetricKind::Impressions {
            continue;
        }

        for point in &metric.data {
            let Some(date) = parse_point_date(&point.date) else {
                tracing::debug!(
                    date = %point.date,
                    label = %metric.label,
                    "Skipping point with unparseable date"
                );
                continue;
            };
            *buckets.entry(period.bucket_date(date)).or_default() += point.total_value();
        }
    }

    buckets
        .into_iter()
        .map(|(date, impressions)| ImpressionsEntry { date, impressions })
        .collect()
}
