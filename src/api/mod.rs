//! API layer
//!
//! HTTP handlers for:
//! - Dashboard analytics (authenticated)
//! - Internal provisioning (service-to-service)
//! - SSO login/register/refresh/logout proxies
//! - Metrics (Prometheus)

mod auth;
mod dashboard;
mod internal;
pub mod metrics;

pub use auth::auth_router;
pub use dashboard::{PeriodQuery, dashboard_router};
pub use internal::{CreateInternalUserRequest, CreateInternalUserResponse, internal_router};
pub use metrics::metrics_router;
