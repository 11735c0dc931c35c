//! Internal service-to-service endpoints
//!
//! Called by the SSO service, never by browsers.

use axum::{Router, extract::State, middleware, response::Json, routing::post};
use serde::{Deserialize, Serialize};

use crate::AppState;
use crate::auth::require_internal;
use crate::error::AppError;
use crate::service::ProvisioningSource;

/// Create internal router
///
/// Routes:
/// - POST /internal/users - Create-or-fetch a local user for an SSO identity
pub fn internal_router(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/users", post(create_user))
        .route_layer(middleware::from_fn_with_state(state, require_internal))
}

#[derive(Debug, Deserialize)]
pub struct CreateInternalUserRequest {
    pub id: String,
    pub email: String,
    #[serde(default)]
    pub name: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateInternalUserResponse {
    pub success: bool,
    pub user_id: String,
}

/// POST /internal/users
///
/// Idempotent: a second call with the same id returns the existing user.
async fn create_user(
    State(state): State<AppState>,
    Json(body): Json<CreateInternalUserRequest>,
) -> Result<Json<CreateInternalUserResponse>, AppError> {
    let id = body.id.trim();
    let email = body.email.trim();
    if id.is_empty() || email.is_empty() {
        return Err(AppError::Validation("id and email are required".to_string()));
    }

    tracing::info!(user_id = %id, email = %email, "Internal callback: creating local user");

    let account = state
        .organizations
        .create_org_and_user_with_id(id, email, body.name.as_deref(), ProvisioningSource::Internal)
        .await?;

    tracing::info!(
        user_id = %account.user.id,
        created = account.created,
        "Internal callback: local user ready"
    );

    Ok(Json(CreateInternalUserResponse {
        success: true,
        user_id: account.user.id,
    }))
}
