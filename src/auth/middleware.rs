//! Authentication middleware
//!
//! Protects routes that require authentication.

use axum::{
    async_trait,
    extract::{FromRef, FromRequestParts, State},
    http::{Request, request::Parts},
    middleware::Next,
    response::Response,
};

use super::resolver::{AuthContext, RequestCredentials, verify_internal_token};
use crate::AppState;
use crate::error::AppError;

/// Middleware to require an authenticated user and organization
///
/// Adds [`AuthContext`] to request extensions if valid.
///
/// # Usage
/// ```ignore
/// let protected_routes = Router::new()
///     .route("/dashboard/summary", ...)
///     .route_layer(middleware::from_fn_with_state(state, require_auth));
/// ```
pub async fn require_auth(
    State(state): State<AppState>,
    mut request: Request<axum::body::Body>,
    next: Next,
) -> Result<Response, AppError> {
    let credentials = RequestCredentials::from_headers(request.headers());
    let context = state.auth.resolve(&credentials).await?;

    request.extensions_mut().insert(context);

    Ok(next.run(request).await)
}

/// Middleware for service-to-service routes
///
/// Only a bearer token carrying the configured internal role is accepted.
pub async fn require_internal(
    State(state): State<AppState>,
    request: Request<axum::body::Body>,
    next: Next,
) -> Result<Response, AppError> {
    verify_internal_token(
        request.headers(),
        &state.config.auth.jwt_secret,
        &state.config.auth.internal_role,
    )?;

    Ok(next.run(request).await)
}

/// Extractor for the current authentication context
///
/// # Usage
/// ```ignore
/// async fn handler(
///     CurrentContext(ctx): CurrentContext,
/// ) -> impl IntoResponse {
///     format!("Hello, {}", ctx.user.email)
/// }
/// ```
#[derive(Debug, Clone)]
pub struct CurrentContext(pub AuthContext);

#[async_trait]
impl<S> FromRequestParts<S> for CurrentContext
where
    AppState: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = AppError;

    /// Reuse the context set by [`require_auth`], resolving it if the route
    /// is not behind the middleware
    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        if let Some(context) = parts.extensions.get::<AuthContext>().cloned() {
            return Ok(CurrentContext(context));
        }

        let state = AppState::from_ref(state);
        let credentials = RequestCredentials::from_headers(&parts.headers);
        let context = state.auth.resolve(&credentials).await?;
        parts.extensions.insert(context.clone());

        Ok(CurrentContext(context))
    }
}
