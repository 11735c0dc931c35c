//! Data models
//!
//! Rust structs representing database entities.
//! All models use ULID for IDs and chrono for timestamps.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// =============================================================================
// ID Types
// =============================================================================

/// Entity ID wrapper (ULID format, 26 characters)
///
/// Example: "01ARZ3NDEKTSV4RRFFQ69G5FAV"
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntityId(pub String);

impl EntityId {
    /// Generate a new ULID
    pub fn new() -> Self {
        Self(ulid::Ulid::new().to_string())
    }
}

impl Default for EntityId {
    fn default() -> Self {
        Self::new()
    }
}

// =============================================================================
// Organization
// =============================================================================

/// Tenant boundary. Owns users (via memberships), integrations and posts.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Organization {
    pub id: String,
    pub name: String,
    /// Key used by the public API; provisioned lazily on first login
    pub api_key: Option<String>,
    pub created_at: DateTime<Utc>,
}

// =============================================================================
// User
// =============================================================================

/// A local user record
///
/// Legacy session tokens embed this struct verbatim, so every field
/// except `id` tolerates being absent when deserialized.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
    #[serde(default)]
    pub activated: bool,
    #[serde(default)]
    pub is_super_admin: bool,
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
}

impl User {
    /// Drop the password hash before the user leaves the persistence layer
    pub fn without_password(mut self) -> Self {
        self.password = None;
        self
    }
}

// =============================================================================
// Membership
// =============================================================================

/// Role a user holds inside an organization
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Role {
    SuperAdmin,
    Admin,
    User,
}

/// Link between a user and an organization
///
/// The membership id doubles as the impersonation target identifier.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Membership {
    pub id: String,
    pub user_id: String,
    pub organization_id: String,
    pub role: Role,
    /// A disabled membership hides the organization from the user
    pub disabled: bool,
    pub created_at: DateTime<Utc>,
}

/// Organization together with (a subset of) its memberships
#[derive(Debug, Clone, Serialize)]
pub struct OrganizationWithMembers {
    pub organization: Organization,
    pub members: Vec<Membership>,
}

/// Result of resolving an impersonation target
#[derive(Debug, Clone)]
pub struct MembershipContext {
    pub user: User,
    pub organization: Organization,
    /// All memberships of the organization
    pub members: Vec<Membership>,
}

/// Outcome of an idempotent create-or-fetch provisioning call
#[derive(Debug, Clone)]
pub struct ProvisionedAccount {
    pub user: User,
    /// First organization of the user; `None` only for pre-existing users without one
    pub organization: Option<Organization>,
    /// `false` when the user already existed and nothing was written
    pub created: bool,
}

// =============================================================================
// Integration
// =============================================================================

/// Integration kind: social channels feed the dashboard, articles do not
pub const INTEGRATION_TYPE_SOCIAL: &str = "social";

/// A connected external channel
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Integration {
    pub id: String,
    pub organization_id: String,
    pub name: String,
    /// Platform name, e.g. "x", "linkedin", "instagram"
    pub provider_identifier: String,
    #[sqlx(rename = "type")]
    #[serde(rename = "type")]
    pub integration_type: String,
    pub disabled: bool,
    pub deleted_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

// =============================================================================
// Post
// =============================================================================

/// Scheduled or published content
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Post {
    pub id: String,
    pub organization_id: String,
    pub integration_id: Option<String>,
    pub content: String,
    pub publish_date: Option<DateTime<Utc>>,
    pub deleted_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

/// Projection used by the posts trend: publish date + platform of a live integration
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct PublishedPost {
    pub publish_date: DateTime<Utc>,
    pub provider_identifier: String,
}
