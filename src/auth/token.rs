//! Signed token handling
//!
//! Two token shapes are accepted, both HS256-signed with the shared secret:
//! - SSO tokens, carrying a `sub` claim with the user id
//! - legacy session tokens, whose payload is a serialized [`User`]

use chrono::{Duration, Utc};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};

use crate::data::User;
use crate::error::AppError;

/// Claims issued by the SSO service
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SsoClaims {
    pub sub: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub roles: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exp: Option<i64>,
}

/// Claims of a service-to-service token
///
/// Only the role list is checked; the subject may be absent.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ServiceClaims {
    #[serde(default)]
    pub sub: Option<String>,
    #[serde(default)]
    pub roles: Vec<String>,
}

impl ServiceClaims {
    pub fn has_role(&self, role: &str) -> bool {
        self.roles.iter().any(|r| r == role)
    }
}

/// Verified token payload
#[derive(Debug, Clone)]
pub enum TokenPayload {
    Sso(SsoClaims),
    Legacy(Box<User>),
}

fn validation() -> Validation {
    let mut validation = Validation::new(Algorithm::HS256);
    // Legacy session tokens carry no `exp`; it is still checked when present
    validation.required_spec_claims.clear();
    validation.validate_aud = false;
    validation
}

/// Verify a token and classify its payload
///
/// # Errors
/// Returns the verification error for a bad signature, an expired `exp`,
/// or a payload that is neither an SSO nor a legacy token
pub fn verify_token(
    token: &str,
    secret: &str,
) -> Result<TokenPayload, jsonwebtoken::errors::Error> {
    let key = DecodingKey::from_secret(secret.as_bytes());
    let data = decode::<serde_json::Value>(token, &key, &validation())?;
    classify_payload(data.claims)
}

fn classify_payload(
    claims: serde_json::Value,
) -> Result<TokenPayload, jsonwebtoken::errors::Error> {
    let has_subject = claims
        .get("sub")
        .and_then(|sub| sub.as_str())
        .is_some_and(|sub| !sub.is_empty());

    if has_subject {
        let claims: SsoClaims = serde_json::from_value(claims)?;
        Ok(TokenPayload::Sso(claims))
    } else {
        let user: User = serde_json::from_value(claims)?;
        Ok(TokenPayload::Legacy(Box::new(user)))
    }
}

/// Verify a service-to-service token
pub fn verify_service_claims(
    token: &str,
    secret: &str,
) -> Result<ServiceClaims, jsonwebtoken::errors::Error> {
    let key = DecodingKey::from_secret(secret.as_bytes());
    let data = decode::<ServiceClaims>(token, &key, &validation())?;
    Ok(data.claims)
}

/// Sign arbitrary claims with the shared secret
pub fn issue_token<T: Serialize>(claims: &T, secret: &str) -> Result<String, AppError> {
    encode(
        &Header::new(Algorithm::HS256),
        claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .map_err(|e| AppError::Internal(anyhow::anyhow!("Failed to sign token: {}", e)))
}

/// Issue an SSO-shaped token valid for `ttl`
pub fn issue_sso_token(
    subject: &str,
    email: Option<&str>,
    roles: &[&str],
    ttl: Duration,
    secret: &str,
) -> Result<String, AppError> {
    let claims = SsoClaims {
        sub: subject.to_string(),
        email: email.map(ToOwned::to_owned),
        roles: roles.iter().map(|r| r.to_string()).collect(),
        exp: Some((Utc::now() + ttl).timestamp()),
    };
    issue_token(&claims, secret)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const SECRET: &str = "test-secret-that-is-long-enough-0123456789";

    #[test]
    fn sso_token_roundtrip() {
        let token = issue_sso_token(
            "u1",
            Some("u1@example.com"),
            &["system-internal"],
            Duration::minutes(5),
            SECRET,
        )
        .unwrap();

        match verify_token(&token, SECRET).unwrap() {
            TokenPayload::Sso(claims) => {
                assert_eq!(claims.sub, "u1");
                assert_eq!(claims.email.as_deref(), Some("u1@example.com"));
                assert_eq!(claims.roles, vec!["system-internal".to_string()]);
            }
            other => panic!("expected SSO payload, got {other:?}"),
        }
    }

    #[test]
    fn legacy_token_without_exp_is_accepted() {
        let token = issue_token(
            &json!({"id": "legacy-1", "email": "l@example.com", "activated": true}),
            SECRET,
        )
        .unwrap();

        match verify_token(&token, SECRET).unwrap() {
            TokenPayload::Legacy(user) => {
                assert_eq!(user.id, "legacy-1");
                assert!(user.activated);
            }
            other => panic!("expected legacy payload, got {other:?}"),
        }
    }

    #[test]
    fn expired_token_is_rejected() {
        let token = issue_sso_token("u1", None, &[], Duration::hours(-2), SECRET).unwrap();
        assert!(verify_token(&token, SECRET).is_err());
    }

    #[test]
    fn wrong_secret_is_rejected() {
        let token = issue_sso_token("u1", None, &[], Duration::minutes(5), SECRET).unwrap();
        assert!(verify_token(&token, "another-secret-that-is-long-enough-000").is_err());
    }

    #[test]
    fn payload_without_subject_or_user_shape_is_rejected() {
        let token = issue_token(&json!({"foo": "bar"}), SECRET).unwrap();
        assert!(verify_token(&token, SECRET).is_err());
    }

    #[test]
    fn service_token_needs_only_roles() {
        let exp = (Utc::now() + Duration::minutes(5)).timestamp();
        let claims = json!({"roles": ["system-internal"], "exp": exp});
        let token = issue_token(&claims, SECRET).unwrap();

        let claims = verify_service_claims(&token, SECRET).unwrap();
        assert!(claims.sub.is_none());
        assert!(claims.has_role("system-internal"));
        assert!(!claims.has_role("admin"));
    }

    #[test]
    fn service_token_without_roles_has_none() {
        let token = issue_sso_token("svc", None, &[], Duration::minutes(5), SECRET).unwrap();
        let claims = verify_service_claims(&token, SECRET).unwrap();
        assert_eq!(claims.sub.as_deref(), Some("svc"));
        assert!(!claims.has_role("system-internal"));
    }

    #[test]
    fn garbage_is_rejected() {
        assert!(verify_token("not-a-token", SECRET).is_err());
    }
}
