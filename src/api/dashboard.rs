//! Dashboard API endpoints
//!
//! Organization-scoped analytics views. All routes require authentication;
//! the organization comes from the auth context.

use axum::{
    Router,
    extract::{Query, State},
    middleware,
    response::Json,
    routing::get,
};
use serde::Deserialize;

use crate::AppState;
use crate::analytics::Period;
use crate::auth::{CurrentContext, require_auth};
use crate::error::AppError;
use crate::service::{DashboardSummary, ImpressionsEntry, PostsTrendEntry, TrafficEntry};

/// Create dashboard router
///
/// Routes:
/// - GET /dashboard/summary
/// - GET /dashboard/posts-trend?period=daily|weekly|monthly
/// - GET /dashboard/traffics
/// - GET /dashboard/impressions?period=daily|weekly|monthly
pub fn dashboard_router(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/summary", get(summary))
        .route("/posts-trend", get(posts_trend))
        .route("/traffics", get(traffics))
        .route("/impressions", get(impressions))
        .route_layer(middleware::from_fn_with_state(state, require_auth))
}

/// `?period=` query parameter
#[derive(Debug, Default, Deserialize)]
pub struct PeriodQuery {
    pub period: Option<String>,
}

impl PeriodQuery {
    /// Parsed period, `daily` when absent
    fn period(&self) -> Result<Period, AppError> {
        match self.period.as_deref() {
            None | Some("") => Ok(Period::default()),
            Some(value) => value.parse().map_err(AppError::Validation),
        }
    }
}

/// GET /dashboard/summary
async fn summary(
    State(state): State<AppState>,
    CurrentContext(ctx): CurrentContext,
) -> Result<Json<DashboardSummary>, AppError> {
    let summary = state.dashboard.summary(&ctx.organization.id).await?;
    Ok(Json(summary))
}

/// GET /dashboard/posts-trend
async fn posts_trend(
    State(state): State<AppState>,
    CurrentContext(ctx): CurrentContext,
    Query(query): Query<PeriodQuery>,
) -> Result<Json<Vec<PostsTrendEntry>>, AppError> {
    let period = query.period()?;
    let trend = state
        .dashboard
        .posts_trend(&ctx.organization.id, period)
        .await?;
    Ok(Json(trend))
}

/// GET /dashboard/traffics
async fn traffics(
    State(state): State<AppState>,
    CurrentContext(ctx): CurrentContext,
) -> Result<Json<Vec<TrafficEntry>>, AppError> {
    let traffics = state.dashboard.traffics(&ctx.organization.id).await?;
    Ok(Json(traffics))
}

/// GET /dashboard/impressions
async fn impressions(
    State(state): State<AppState>,
    CurrentContext(ctx): CurrentContext,
    Query(query): Query<PeriodQuery>,
) -> Result<Json<Vec<ImpressionsEntry>>, AppError> {
    let period = query.period()?;
    let impressions = state
        .dashboard
        .impressions(&ctx.organization.id, period)
        .await?;
    Ok(Json(impressions))
}
