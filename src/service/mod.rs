//! Service layer
//!
//! Contains business logic separated from HTTP handlers.
//! Services orchestrate database, cache, and analytics operations.

mod dashboard;
mod organization;

pub use dashboard::{
    DashboardCacheKey, DashboardService, DashboardSummary, ImpressionsEntry, PostsTrendEntry,
    TrafficEntry,
};
pub use organization::{OrganizationService, ProvisioningSource, generate_api_key};
