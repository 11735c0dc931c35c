//! Authentication
//!
//! Handles:
//! - Token verification (SSO and legacy session tokens)
//! - Request authentication, organization selection and impersonation
//! - Authentication middleware
//! - SSO upstream client

mod middleware;
mod resolver;
mod sso;
pub mod token;

pub use middleware::{CurrentContext, require_auth, require_internal};
pub use resolver::{
    AUTH_COOKIE, AuthContext, AuthFailure, AuthResolver, IMPERSONATE, RequestCredentials, SHOW_ORG,
};
pub use sso::{PasswordScheme, SsoAccessData, SsoClient, SsoTokenResponse, SsoUser};
