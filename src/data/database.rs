//! SQLite database operations
//!
//! All database access goes through this module.
//! Uses SQLx with runtime-checked queries.

use chrono::{DateTime, Utc};
use sqlx::{Pool, Sqlite, SqlitePool};
use std::path::Path;

use super::models::*;
use crate::error::AppError;

/// Database connection pool wrapper.
pub struct Database {
    pool: Pool<Sqlite>,
}

/// Row shape for "organizations of a user" joined with that user's membership
#[derive(sqlx::FromRow)]
struct UserOrganizationRow {
    id: String,
    name: String,
    api_key: Option<String>,
    created_at: DateTime<Utc>,
    membership_id: String,
    membership_role: Role,
    membership_disabled: bool,
    membership_created_at: DateTime<Utc>,
}

impl UserOrganizationRow {
    fn into_organization(self, user_id: &str) -> OrganizationWithMembers {
        let membership = Membership {
            id: self.membership_id,
            user_id: user_id.to_string(),
            organization_id: self.id.clone(),
            role: self.membership_role,
            disabled: self.membership_disabled,
            created_at: self.membership_created_at,
        };

        OrganizationWithMembers {
            organization: Organization {
                id: self.id,
                name: self.name,
                api_key: self.api_key,
                created_at: self.created_at,
            },
            members: vec![membership],
        }
    }
}

fn default_organization_name(email: &str, name: Option<&str>) -> String {
    name.map(str::trim)
        .filter(|value| !value.is_empty())
        .map(ToOwned::to_owned)
        .unwrap_or_else(|| email.to_string())
}

impl Database {
    /// Connect to SQLite database
    ///
    /// Creates the database file if it doesn't exist.
    /// Runs pending migrations automatically.
    ///
    /// # Arguments
    /// * `path` - Path to SQLite database file
    ///
    /// # Errors
    /// Returns error if connection or migration fails
    pub async fn connect(path: &Path) -> Result<Self, AppError> {
        // Create parent directory if it doesn't exist
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| AppError::Database(sqlx::Error::Io(e)))?;
        }

        // Create connection string
        let connection_string = format!("sqlite:{}?mode=rwc", path.display());

        // Create connection pool
        let pool = SqlitePool::connect(&connection_string).await?;

        // Run migrations
        sqlx::migrate!("./migrations")
            .run(&pool)
            .await
            .map_err(|e| {
                tracing::error!("Migration failed: {}", e);
                AppError::Internal(anyhow::anyhow!("Migration failed: {}", e))
            })?;

        tracing::info!("Database connected and migrated successfully");

        Ok(Self { pool })
    }

    // =========================================================================
    // Users
    // =========================================================================

    /// Get a user by ID (password included)
    pub async fn get_user(&self, id: &str) -> Result<Option<User>, AppError> {
        let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(user)
    }

    /// Insert a user row
    pub async fn insert_user(&self, user: &User) -> Result<(), AppError> {
        sqlx::query(
            r#"
            INSERT INTO users (id, email, name, password, activated, is_super_admin, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&user.id)
        .bind(&user.email)
        .bind(&user.name)
        .bind(&user.password)
        .bind(user.activated)
        .bind(user.is_super_admin)
        .bind(user.created_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    // =========================================================================
    // Organizations & memberships
    // =========================================================================

    /// Get an organization by ID
    pub async fn get_organization(&self, id: &str) -> Result<Option<Organization>, AppError> {
        let organization =
            sqlx::query_as::<_, Organization>("SELECT * FROM organizations WHERE id = ?")
                .bind(id)
                .fetch_optional(&self.pool)
                .await?;

        Ok(organization)
    }

    /// Insert an organization row
    pub async fn insert_organization(&self, organization: &Organization) -> Result<(), AppError> {
        sqlx::query("INSERT INTO organizations (id, name, api_key, created_at) VALUES (?, ?, ?, ?)")
            .bind(&organization.id)
            .bind(&organization.name)
            .bind(&organization.api_key)
            .bind(organization.created_at)
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    /// Insert a membership row
    pub async fn insert_membership(&self, membership: &Membership) -> Result<(), AppError> {
        sqlx::query(
            r#"
            INSERT INTO memberships (id, user_id, organization_id, role, disabled, created_at)
            VALUES (?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&membership.id)
        .bind(&membership.user_id)
        .bind(&membership.organization_id)
        .bind(membership.role)
        .bind(membership.disabled)
        .bind(membership.created_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Organizations a user belongs to, in membership creation order
    ///
    /// Each entry carries only the requesting user's own membership, so
    /// callers can inspect `members[0].disabled`.
    pub async fn get_organizations_for_user(
        &self,
        user_id: &str,
    ) -> Result<Vec<OrganizationWithMembers>, AppError> {
        let rows = sqlx::query_as::<_, UserOrganizationRow>(
            r#"
            SELECT o.id, o.name, o.api_key, o.created_at,
                   m.id AS membership_id,
                   m.role AS membership_role,
                   m.disabled AS membership_disabled,
                   m.created_at AS membership_created_at
            FROM memberships m
            JOIN organizations o ON o.id = m.organization_id
            WHERE m.user_id = ?
            ORDER BY m.created_at ASC, m.id ASC
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|row| row.into_organization(user_id))
            .collect())
    }

    /// Resolve a membership ID to its user, organization and the organization's members
    pub async fn get_membership_context(
        &self,
        membership_id: &str,
    ) -> Result<Option<MembershipContext>, AppError> {
        let Some(membership) =
            sqlx::query_as::<_, Membership>("SELECT * FROM memberships WHERE id = ?")
                .bind(membership_id)
                .fetch_optional(&self.pool)
                .await?
        else {
            return Ok(None);
        };

        let Some(user) = self.get_user(&membership.user_id).await? else {
            return Ok(None);
        };
        let Some(organization) = self.get_organization(&membership.organization_id).await? else {
            return Ok(None);
        };

        let members = sqlx::query_as::<_, Membership>(
            "SELECT * FROM memberships WHERE organization_id = ? ORDER BY created_at ASC, id ASC",
        )
        .bind(&organization.id)
        .fetch_all(&self.pool)
        .await?;

        Ok(Some(MembershipContext {
            user,
            organization,
            members,
        }))
    }

    /// Store a freshly generated API key on an organization
    ///
    /// Only fills an empty slot, so concurrent first logins keep the first key.
    ///
    /// # Returns
    /// The key stored on the organization after the call.
    pub async fn set_organization_api_key(
        &self,
        organization_id: &str,
        api_key: &str,
    ) -> Result<Option<String>, AppError> {
        sqlx::query("UPDATE organizations SET api_key = ? WHERE id = ? AND api_key IS NULL")
            .bind(api_key)
            .bind(organization_id)
            .execute(&self.pool)
            .await?;

        let stored = sqlx::query_scalar::<_, Option<String>>(
            "SELECT api_key FROM organizations WHERE id = ?",
        )
        .bind(organization_id)
        .fetch_optional(&self.pool)
        .await?
        .flatten();

        Ok(stored)
    }

    /// Create a user with a caller-chosen ID plus its own organization, or fetch it
    ///
    /// The user insert uses `ON CONFLICT DO NOTHING` inside a transaction and the
    /// organization is only created when that insert actually wrote a row, so two
    /// concurrent calls for the same ID never produce two organizations.
    pub async fn create_org_and_user_with_id(
        &self,
        id: &str,
        email: &str,
        name: Option<&str>,
    ) -> Result<ProvisionedAccount, AppError> {
        let now = Utc::now();
        let mut tx = self.pool.begin().await?;

        let inserted = sqlx::query(
            r#"
            INSERT INTO users (id, email, name, password, activated, is_super_admin, created_at)
            VALUES (?, ?, ?, NULL, 1, 0, ?)
            ON CONFLICT(id) DO NOTHING
            "#,
        )
        .bind(id)
        .bind(email)
        .bind(name)
        .bind(now)
        .execute(&mut *tx)
        .await?
        .rows_affected()
            == 1;

        if !inserted {
            tx.rollback().await?;

            let user = self.get_user(id).await?.ok_or(AppError::NotFound)?;
            let organization = self
                .get_organizations_for_user(id)
                .await?
                .into_iter()
                .next()
                .map(|entry| entry.organization);

            return Ok(ProvisionedAccount {
                user,
                organization,
                created: false,
            });
        }

        let organization = Organization {
            id: EntityId::new().0,
            name: default_organization_name(email, name),
            api_key: None,
            created_at: now,
        };

        sqlx::query(
            "INSERT INTO organizations (id, name, api_key, created_at) VALUES (?, ?, NULL, ?)",
        )
        .bind(&organization.id)
        .bind(&organization.name)
        .bind(organization.created_at)
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r#"
            INSERT INTO memberships (id, user_id, organization_id, role, disabled, created_at)
            VALUES (?, ?, ?, ?, 0, ?)
            "#,
        )
        .bind(EntityId::new().0)
        .bind(id)
        .bind(&organization.id)
        .bind(Role::Admin)
        .bind(now)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        let user = User {
            id: id.to_string(),
            email: email.to_string(),
            name: name.map(ToOwned::to_owned),
            password: None,
            activated: true,
            is_super_admin: false,
            created_at: now,
        };

        Ok(ProvisionedAccount {
            user,
            organization: Some(organization),
            created: true,
        })
    }

    /// Number of organizations a user is a member of
    pub async fn count_organizations_for_user(&self, user_id: &str) -> Result<i64, AppError> {
        let count =
            sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM memberships WHERE user_id = ?")
                .bind(user_id)
                .fetch_one(&self.pool)
                .await?;

        Ok(count)
    }

    // =========================================================================
    // Integrations
    // =========================================================================

    /// Insert an integration row
    pub async fn insert_integration(&self, integration: &Integration) -> Result<(), AppError> {
        sqlx::query(
            r#"
            INSERT INTO integrations (
                id, organization_id, name, provider_identifier, type,
                disabled, deleted_at, created_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&integration.id)
        .bind(&integration.organization_id)
        .bind(&integration.name)
        .bind(&integration.provider_identifier)
        .bind(&integration.integration_type)
        .bind(integration.disabled)
        .bind(integration.deleted_at)
        .bind(integration.created_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Enabled, non-deleted social integrations of an organization
    pub async fn get_active_integrations(
        &self,
        organization_id: &str,
    ) -> Result<Vec<Integration>, AppError> {
        let integrations = sqlx::query_as::<_, Integration>(
            r#"
            SELECT * FROM integrations
            WHERE organization_id = ?
              AND deleted_at IS NULL
              AND disabled = 0
              AND type = ?
            ORDER BY created_at ASC, id ASC
            "#,
        )
        .bind(organization_id)
        .bind(INTEGRATION_TYPE_SOCIAL)
        .fetch_all(&self.pool)
        .await?;

        Ok(integrations)
    }

    /// Count of enabled, non-deleted social integrations of an organization
    pub async fn count_channels(&self, organization_id: &str) -> Result<i64, AppError> {
        let count = sqlx::query_scalar::<_, i64>(
            r#"
            SELECT COUNT(*) FROM integrations
            WHERE organization_id = ?
              AND deleted_at IS NULL
              AND disabled = 0
              AND type = ?
            "#,
        )
        .bind(organization_id)
        .bind(INTEGRATION_TYPE_SOCIAL)
        .fetch_one(&self.pool)
        .await?;

        Ok(count)
    }

    // =========================================================================
    // Posts
    // =========================================================================

    /// Insert a post row
    pub async fn insert_post(&self, post: &Post) -> Result<(), AppError> {
        sqlx::query(
            r#"
            INSERT INTO posts (
                id, organization_id, integration_id, content, publish_date, deleted_at, created_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&post.id)
        .bind(&post.organization_id)
        .bind(&post.integration_id)
        .bind(&post.content)
        .bind(post.publish_date)
        .bind(post.deleted_at)
        .bind(post.created_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Count of non-deleted posts of an organization
    pub async fn count_posts(&self, organization_id: &str) -> Result<i64, AppError> {
        let count = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM posts WHERE organization_id = ? AND deleted_at IS NULL",
        )
        .bind(organization_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(count)
    }

    /// Non-deleted posts published since `since` whose integration is still live
    pub async fn get_published_posts_since(
        &self,
        organization_id: &str,
        since: DateTime<Utc>,
    ) -> Result<Vec<PublishedPost>, AppError> {
        let posts = sqlx::query_as::<_, PublishedPost>(
            r#"
            SELECT p.publish_date AS publish_date, i.provider_identifier AS provider_identifier
            FROM posts p
            JOIN integrations i ON i.id = p.integration_id
            WHERE p.organization_id = ?
              AND p.deleted_at IS NULL
              AND p.publish_date IS NOT NULL
              AND p.publish_date >= ?
              AND i.deleted_at IS NULL
            "#,
        )
        .bind(organization_id)
        .bind(since)
        .fetch_all(&self.pool)
        .await?;

        Ok(posts)
    }
}
