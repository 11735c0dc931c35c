//! Metric label classification
//!
//! Analytics providers name their series freely ("Impressions", "Page Views",
//! "Link Clicks", ...). Dashboard aggregates only care about two kinds.

use serde::{Deserialize, Serialize};

/// Kind of a metric series as far as the dashboard is concerned
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MetricKind {
    Impressions,
    Traffic,
    Unclassified,
}

const IMPRESSION_PATTERNS: &[&str] = &["impression", "views", "page views", "reach"];
const TRAFFIC_PATTERNS: &[&str] = &["click", "engagement", "traffic"];

impl MetricKind {
    /// Classify a metric label, case-insensitively
    ///
    /// Impression patterns are checked first, so a label matching both
    /// groups counts as impressions only.
    pub fn classify(label: &str) -> Self {
        let label = label.to_lowercase();

        if IMPRESSION_PATTERNS.iter().any(|p| label.contains(p)) {
            MetricKind::Impressions
        } else if TRAFFIC_PATTERNS.iter().any(|p| label.contains(p)) {
            MetricKind::Traffic
        } else {
            MetricKind::Unclassified
        }
    }
}
