//! Prometheus metrics registry and instruments.
//!
//! This module is framework-agnostic and can be used from any layer.

use std::sync::Once;

use lazy_static::lazy_static;
use prometheus::{HistogramOpts, IntCounterVec, Opts, Registry};

lazy_static! {
    /// Global Prometheus registry
    pub static ref REGISTRY: Registry = Registry::new();

    // Dashboard cache metrics
    pub static ref CACHE_HITS_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new("postdeck_cache_hits_total", "Total number of dashboard cache hits"),
        &["query"]
    ).expect("metric can be created");
    pub static ref CACHE_MISSES_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new("postdeck_cache_misses_total", "Total number of dashboard cache misses"),
        &["query"]
    ).expect("metric can be created");

    // Analytics fan-out metrics
    pub static ref ANALYTICS_FETCH_FAILURES_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new(
            "postdeck_analytics_fetch_failures_total",
            "Per-integration analytics fetches that failed and were skipped"
        ),
        &["provider"]
    ).expect("metric can be created");
    pub static ref ANALYTICS_FETCH_DURATION_SECONDS: prometheus::HistogramVec =
        prometheus::HistogramVec::new(
        HistogramOpts::new(
            "postdeck_analytics_fetch_duration_seconds",
            "Per-integration analytics fetch duration in seconds"
        ).buckets(vec![0.01, 0.05, 0.1, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0]),
        &["provider"]
    ).expect("metric can be created");

    // Auth metrics
    pub static ref AUTH_REJECTIONS_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new("postdeck_auth_rejections_total", "Requests rejected by the auth resolver"),
        &["reason"]
    ).expect("metric can be created");
    pub static ref USERS_PROVISIONED_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new(
            "postdeck_users_provisioned_total",
            "Local users created from an external identity"
        ),
        &["source"]
    ).expect("metric can be created");

    // Error Metrics
    pub static ref ERRORS_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new("postdeck_errors_total", "Total number of errors"),
        &["error_type", "endpoint"]
    ).expect("metric can be created");
}

static INIT: Once = Once::new();

/// Initialize metrics registry.
///
/// Safe to call more than once; registration only happens the first time.
pub fn init_metrics() {
    INIT.call_once(|| {
        REGISTRY
            .register(Box::new(CACHE_HITS_TOTAL.clone()))
            .expect("CACHE_HITS_TOTAL can be registered");
        REGISTRY
            .register(Box::new(CACHE_MISSES_TOTAL.clone()))
            .expect("CACHE_MISSES_TOTAL can be registered");
        REGISTRY
            .register(Box::new(ANALYTICS_FETCH_FAILURES_TOTAL.clone()))
            .expect("ANALYTICS_FETCH_FAILURES_TOTAL can be registered");
        REGISTRY
            .register(Box::new(ANALYTICS_FETCH_DURATION_SECONDS.clone()))
            .expect("ANALYTICS_FETCH_DURATION_SECONDS can be registered");
        REGISTRY
            .register(Box::new(AUTH_REJECTIONS_TOTAL.clone()))
            .expect("AUTH_REJECTIONS_TOTAL can be registered");
        REGISTRY
            .register(Box::new(USERS_PROVISIONED_TOTAL.clone()))
            .expect("USERS_PROVISIONED_TOTAL can be registered");
        REGISTRY
            .register(Box::new(ERRORS_TOTAL.clone()))
            .expect("ERRORS_TOTAL can be registered");

        tracing::info!("Metrics registry initialized");
    });
}
