//! Public authentication endpoints
//!
//! Thin proxies to the SSO service that manage the `auth` cookie.

use axum::{
    Router,
    extract::State,
    http::{HeaderName, HeaderValue},
    response::{IntoResponse, Json},
    routing::post,
};
use axum_extra::extract::CookieJar;
use axum_extra::extract::cookie::{Cookie, SameSite};
use serde::Deserialize;

use crate::AppState;
use crate::auth::{AUTH_COOKIE, SsoTokenResponse};
use crate::error::AppError;

const REFRESH_TOKEN_COOKIE: &str = "refresh_token";

/// Create auth router
///
/// Routes:
/// - POST /auth/register
/// - POST /auth/login
/// - POST /auth/refresh
/// - POST /auth/logout
pub fn auth_router() -> Router<AppState> {
    Router::new()
        .route("/register", post(register))
        .route("/login", post(login))
        .route("/refresh", post(refresh))
        .route("/logout", post(logout))
}

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub email: String,
    pub password: String,
    #[serde(default)]
    pub vcode: String,
    #[serde(default)]
    pub username: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct RefreshRequest {
    #[serde(default)]
    pub refresh_token: Option<String>,
}

fn build_auth_cookie(token: String, secure: bool) -> Cookie<'static> {
    let builder = Cookie::build((AUTH_COOKIE, token)).path("/").http_only(true);

    if secure {
        builder.secure(true).same_site(SameSite::None).build()
    } else {
        builder.same_site(SameSite::Lax).build()
    }
}

fn clear_auth_cookie(secure: bool) -> Cookie<'static> {
    let mut cookie = build_auth_cookie(String::new(), secure);
    cookie.make_removal();
    cookie
}

fn with_session(
    state: &AppState,
    jar: CookieJar,
    response: SsoTokenResponse,
) -> (CookieJar, Json<SsoTokenResponse>) {
    let secure = state.config.should_use_secure_cookies();
    let jar = jar.add(build_auth_cookie(
        response.access_data.access_token.clone(),
        secure,
    ));
    (jar, Json(response))
}

/// POST /auth/register
async fn register(
    State(state): State<AppState>,
    jar: CookieJar,
    Json(body): Json<RegisterRequest>,
) -> Result<impl IntoResponse, AppError> {
    let response = state
        .sso
        .register(&body.email, &body.password, &body.vcode, body.username.as_deref())
        .await?;
    Ok(with_session(&state, jar, response))
}

/// POST /auth/login
async fn login(
    State(state): State<AppState>,
    jar: CookieJar,
    Json(body): Json<LoginRequest>,
) -> Result<impl IntoResponse, AppError> {
    let response = state.sso.login(&body.email, &body.password).await?;
    Ok(with_session(&state, jar, response))
}

/// POST /auth/refresh
///
/// The refresh token comes from the body, falling back to the `refresh_token` cookie.
async fn refresh(
    State(state): State<AppState>,
    jar: CookieJar,
    body: Option<Json<RefreshRequest>>,
) -> Result<impl IntoResponse, AppError> {
    let refresh_token = body
        .and_then(|Json(body)| body.refresh_token)
        .filter(|t| !t.is_empty())
        .or_else(|| jar.get(REFRESH_TOKEN_COOKIE).map(|c| c.value().to_string()))
        .ok_or_else(|| AppError::Validation("refresh_token is required".to_string()))?;

    let response = state.sso.refresh_token(&refresh_token).await?;
    Ok(with_session(&state, jar, response))
}

/// POST /auth/logout
///
/// Always succeeds locally; the upstream call is best effort.
async fn logout(State(state): State<AppState>, jar: CookieJar) -> impl IntoResponse {
    if let Some(refresh_token) = jar.get(REFRESH_TOKEN_COOKIE).map(|c| c.value().to_string()) {
        state.sso.logout(&refresh_token).await;
    }

    let jar = jar.add(clear_auth_cookie(state.config.should_use_secure_cookies()));
    (
        [(HeaderName::from_static("logout"), HeaderValue::from_static("true"))],
        jar,
        Json(serde_json::json!({ "success": true })),
    )
}
