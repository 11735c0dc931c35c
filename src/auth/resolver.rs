//! Request authentication
//!
//! Turns the credentials of one request into an [`AuthContext`]:
//! verify the token, resolve the user (provisioning SSO users on first
//! sight), apply super-admin impersonation, then pick the organization.
//! Every failure is a typed [`AuthFailure`] internally and a plain
//! `403 Forbidden` externally.

use axum::http::HeaderMap;
use axum_extra::extract::CookieJar;
use std::sync::Arc;
use thiserror::Error;

use super::token::{TokenPayload, verify_token};
use crate::data::{Membership, Organization, User};
use crate::error::AppError;
use crate::metrics::AUTH_REJECTIONS_TOTAL;
use crate::service::{OrganizationService, ProvisioningSource};

/// Name of the header and cookie carrying a raw token
pub const AUTH_COOKIE: &str = "auth";
/// Header/cookie selecting one of the user's organizations
pub const SHOW_ORG: &str = "showorg";
/// Header/cookie naming the membership a super admin wants to act as
pub const IMPERSONATE: &str = "impersonate";

/// Why a request was rejected
///
/// Never shown to the caller.
#[derive(Debug, Error)]
pub enum AuthFailure {
    #[error("no credential supplied")]
    MissingCredential,

    #[error("token rejected: {0}")]
    InvalidToken(#[from] jsonwebtoken::errors::Error),

    #[error("token subject has no local user and no email to provision one")]
    UnknownUser,

    #[error("user is not activated")]
    Inactive,

    #[error("user has no usable organization")]
    NoOrganization,

    #[error("token lacks role {0:?}")]
    MissingRole(String),

    #[error("lookup failed: {0}")]
    Lookup(#[from] AppError),
}

impl AuthFailure {
    fn reason(&self) -> &'static str {
        match self {
            AuthFailure::MissingCredential => "missing_credential",
            AuthFailure::InvalidToken(_) => "invalid_token",
            AuthFailure::UnknownUser => "unknown_user",
            AuthFailure::Inactive => "inactive",
            AuthFailure::NoOrganization => "no_organization",
            AuthFailure::MissingRole(_) => "missing_role",
            AuthFailure::Lookup(_) => "lookup",
        }
    }
}

impl From<AuthFailure> for AppError {
    fn from(failure: AuthFailure) -> Self {
        tracing::debug!(reason = failure.reason(), error = %failure, "Rejecting request");
        AUTH_REJECTIONS_TOTAL
            .with_label_values(&[failure.reason()])
            .inc();
        AppError::Forbidden
    }
}

/// Credential inputs of one request
#[derive(Debug, Clone, Default)]
pub struct RequestCredentials {
    pub token: Option<String>,
    pub show_org: Option<String>,
    pub impersonate: Option<String>,
}

fn header_value(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get(name)
        .and_then(|h| h.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(ToOwned::to_owned)
}

fn cookie_value(jar: &CookieJar, name: &str) -> Option<String> {
    jar.get(name)
        .map(|cookie| cookie.value().trim().to_owned())
        .filter(|v| !v.is_empty())
}

/// Extract `Bearer <token>` from the Authorization header
pub fn extract_bearer_token(headers: &HeaderMap) -> Option<String> {
    headers
        .get("Authorization")
        .and_then(|h| h.to_str().ok())
        .and_then(|h| h.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(ToOwned::to_owned)
}

impl RequestCredentials {
    /// Collect credentials from request headers
    ///
    /// Token priority: bearer header, `auth` header, `auth` cookie.
    /// For `showorg` and `impersonate` the cookie wins over the header.
    pub fn from_headers(headers: &HeaderMap) -> Self {
        let jar = CookieJar::from_headers(headers);

        let token = extract_bearer_token(headers)
            .or_else(|| header_value(headers, AUTH_COOKIE))
            .or_else(|| cookie_value(&jar, AUTH_COOKIE));

        Self {
            token,
            show_org: cookie_value(&jar, SHOW_ORG).or_else(|| header_value(headers, SHOW_ORG)),
            impersonate: cookie_value(&jar, IMPERSONATE)
                .or_else(|| header_value(headers, IMPERSONATE)),
        }
    }
}

/// Authenticated identity attached to a request
#[derive(Debug, Clone)]
pub struct AuthContext {
    /// Effective user, password stripped
    pub user: User,
    /// Effective organization
    pub organization: Organization,
    /// Memberships visible in this context
    pub members: Vec<Membership>,
    /// `true` when a super admin is acting as another user
    pub impersonated: bool,
}

/// Resolves request credentials into an [`AuthContext`]
pub struct AuthResolver {
    organizations: Arc<OrganizationService>,
    jwt_secret: String,
}

impl AuthResolver {
    pub fn new(organizations: Arc<OrganizationService>, jwt_secret: String) -> Self {
        Self {
            organizations,
            jwt_secret,
        }
    }

    /// Authenticate one request
    pub async fn resolve(
        &self,
        credentials: &RequestCredentials,
    ) -> Result<AuthContext, AuthFailure> {
        let token = credentials
            .token
            .as_deref()
            .ok_or(AuthFailure::MissingCredential)?;

        let user = match verify_token(token, &self.jwt_secret)? {
            TokenPayload::Sso(claims) => {
                self.resolve_sso_user(&claims.sub, claims.email.as_deref())
                    .await?
            }
            TokenPayload::Legacy(user) => *user,
        };

        if !user.activated {
            return Err(AuthFailure::Inactive);
        }

        if user.is_super_admin {
            if let Some(target) = credentials.impersonate.as_deref() {
                if let Some(context) = self.impersonate(target).await? {
                    return Ok(context);
                }
                tracing::debug!(target = %target, "Impersonation target not found");
            }
        }

        self.select_organization(user.without_password(), credentials.show_org.as_deref())
            .await
    }

    async fn resolve_sso_user(
        &self,
        subject: &str,
        email: Option<&str>,
    ) -> Result<User, AuthFailure> {
        if let Some(user) = self.organizations.get_user(subject).await? {
            return Ok(user);
        }

        let email = email
            .filter(|e| !e.is_empty())
            .ok_or(AuthFailure::UnknownUser)?;

        tracing::warn!(user_id = %subject, "SSO token valid but local user missing, provisioning");
        let account = self
            .organizations
            .create_org_and_user_with_id(subject, email, None, ProvisioningSource::SsoLogin)
            .await?;

        Ok(account.user)
    }

    async fn impersonate(&self, membership_id: &str) -> Result<Option<AuthContext>, AuthFailure> {
        let Some(context) = self.organizations.get_user_org(membership_id).await? else {
            return Ok(None);
        };

        let mut user = context.user.without_password();
        user.is_super_admin = true;

        let members = context
            .members
            .into_iter()
            .filter(|m| m.user_id == user.id)
            .collect();

        tracing::info!(
            user_id = %user.id,
            organization_id = %context.organization.id,
            "Super admin impersonating user"
        );

        Ok(Some(AuthContext {
            user,
            organization: context.organization,
            members,
            impersonated: true,
        }))
    }

    async fn select_organization(
        &self,
        user: User,
        show_org: Option<&str>,
    ) -> Result<AuthContext, AuthFailure> {
        let mut organizations = self.organizations.usable_organizations(&user.id).await?;

        let index = show_org
            .and_then(|wanted| {
                organizations
                    .iter()
                    .position(|org| org.organization.id == wanted)
            })
            .unwrap_or(0);

        if index >= organizations.len() {
            return Err(AuthFailure::NoOrganization);
        }
        let mut selected = organizations.swap_remove(index);

        self.organizations
            .ensure_api_key(&mut selected.organization)
            .await?;

        Ok(AuthContext {
            user,
            organization: selected.organization,
            members: selected.members,
            impersonated: false,
        })
    }
}

/// Check a service-to-service bearer token for a role
pub fn verify_internal_token(
    headers: &HeaderMap,
    jwt_secret: &str,
    required_role: &str,
) -> Result<(), AuthFailure> {
    let token = extract_bearer_token(headers).ok_or(AuthFailure::MissingCredential)?;
    let claims = super::token::verify_service_claims(&token, jwt_secret)?;

    if !claims.has_role(required_role) {
        return Err(AuthFailure::MissingRole(required_role.to_string()));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn headers(pairs: &[(&'static str, &str)]) -> HeaderMap {
        let mut headers = HeaderMap::new();
        for (name, value) in pairs {
            headers.append(*name, HeaderValue::from_str(value).unwrap());
        }
        headers
    }

    #[test]
    fn bearer_wins_over_header_and_cookie() {
        let creds = RequestCredentials::from_headers(&headers(&[
            ("authorization", "Bearer from-bearer"),
            ("auth", "from-header"),
            ("cookie", "auth=from-cookie"),
        ]));
        assert_eq!(creds.token.as_deref(), Some("from-bearer"));
    }

    #[test]
    fn auth_header_wins_over_cookie() {
        let creds = RequestCredentials::from_headers(&headers(&[
            ("auth", "from-header"),
            ("cookie", "auth=from-cookie"),
        ]));
        assert_eq!(creds.token.as_deref(), Some("from-header"));

        let creds = RequestCredentials::from_headers(&headers(&[("cookie", "auth=from-cookie")]));
        assert_eq!(creds.token.as_deref(), Some("from-cookie"));
    }

    #[test]
    fn non_bearer_authorization_is_ignored() {
        let creds = RequestCredentials::from_headers(&headers(&[("authorization", "Basic abc")]));
        assert!(creds.token.is_none());
    }

    #[test]
    fn cookie_wins_for_org_selection_and_impersonation() {
        let creds = RequestCredentials::from_headers(&headers(&[
            ("showorg", "org-header"),
            ("impersonate", "imp-header"),
            ("cookie", "showorg=org-cookie; impersonate=imp-cookie"),
        ]));
        assert_eq!(creds.show_org.as_deref(), Some("org-cookie"));
        assert_eq!(creds.impersonate.as_deref(), Some("imp-cookie"));

        let creds = RequestCredentials::from_headers(&headers(&[("showorg", "org-header")]));
        assert_eq!(creds.show_org.as_deref(), Some("org-header"));
    }

    #[test]
    fn failures_collapse_to_forbidden() {
        let error: AppError = AuthFailure::Inactive.into();
        assert!(matches!(error, AppError::Forbidden));

        let error: AppError = AuthFailure::Lookup(AppError::NotFound).into();
        assert!(matches!(error, AppError::Forbidden));
    }
}
