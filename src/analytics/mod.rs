//! Analytics primitives used by the dashboard
//!
//! - Metric label classification
//! - Period bucketing
//! - Per-integration analytics source

mod classify;
mod period;
mod source;

pub use classify::MetricKind;
pub use period::{Period, parse_point_date};
pub use source::{AnalyticsMetric, AnalyticsPoint, AnalyticsSource, HttpAnalyticsSource};
