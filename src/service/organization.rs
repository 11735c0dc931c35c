//! Organization service
//!
//! User and organization operations shared by the auth resolver and the
//! internal provisioning endpoint.

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use std::sync::Arc;

use crate::data::{
    Database, MembershipContext, Organization, OrganizationWithMembers, ProvisionedAccount, User,
};
use crate::error::AppError;
use crate::metrics::USERS_PROVISIONED_TOTAL;

/// Where a provisioning call came from, used as a metric label
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProvisioningSource {
    /// First request carrying an SSO token for an unknown user
    SsoLogin,
    /// SSO service callback on `POST /internal/users`
    Internal,
}

impl ProvisioningSource {
    fn as_str(self) -> &'static str {
        match self {
            ProvisioningSource::SsoLogin => "sso_login",
            ProvisioningSource::Internal => "internal",
        }
    }
}

/// Generate a new organization API key (32 random bytes, URL-safe base64)
pub fn generate_api_key() -> String {
    let bytes: [u8; 32] = rand::random();
    URL_SAFE_NO_PAD.encode(bytes)
}

/// Organization service
pub struct OrganizationService {
    db: Arc<Database>,
}

impl OrganizationService {
    /// Create new organization service
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    /// Get a user by ID
    pub async fn get_user(&self, id: &str) -> Result<Option<User>, AppError> {
        self.db.get_user(id).await
    }

    /// Organizations the user can act in
    ///
    /// Organizations whose membership for this user is disabled are left out.
    pub async fn usable_organizations(
        &self,
        user_id: &str,
    ) -> Result<Vec<OrganizationWithMembers>, AppError> {
        let organizations = self.db.get_organizations_for_user(user_id).await?;

        Ok(organizations
            .into_iter()
            .filter(|org| org.members.first().is_some_and(|m| !m.disabled))
            .collect())
    }

    /// Resolve an impersonation target (a membership ID)
    pub async fn get_user_org(
        &self,
        membership_id: &str,
    ) -> Result<Option<MembershipContext>, AppError> {
        self.db.get_membership_context(membership_id).await
    }

    /// Make sure the organization has an API key, generating one if needed
    pub async fn ensure_api_key(&self, organization: &mut Organization) -> Result<(), AppError> {
        if organization.api_key.is_some() {
            return Ok(());
        }

        let stored = self
            .db
            .set_organization_api_key(&organization.id, &generate_api_key())
            .await?;
        tracing::info!(organization_id = %organization.id, "Provisioned organization API key");
        organization.api_key = stored;
        Ok(())
    }

    /// Create-or-fetch a user with an externally assigned ID
    ///
    /// Safe to call concurrently for the same ID: at most one organization is
    /// ever created.
    pub async fn create_org_and_user_with_id(
        &self,
        id: &str,
        email: &str,
        name: Option<&str>,
        source: ProvisioningSource,
    ) -> Result<ProvisionedAccount, AppError> {
        let account = self.db.create_org_and_user_with_id(id, email, name).await?;

        if account.created {
            USERS_PROVISIONED_TOTAL
                .with_label_values(&[source.as_str()])
                .inc();
            tracing::info!(user_id = %id, source = source.as_str(), "Provisioned local user");
        } else {
            tracing::debug!(user_id = %id, "User already provisioned");
        }

        Ok(account)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn api_keys_are_url_safe_and_unique() {
        let a = generate_api_key();
        let b = generate_api_key();

        assert_eq!(a.len(), 43);
        assert_ne!(a, b);
        assert!(a.chars().all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_'));
    }
}
