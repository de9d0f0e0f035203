//! Database repositories for users and expert memberships.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use coursegram_authz::{ExpertMembership, ExpertRole};
use coursegram_core::{ExpertId, UserId};
use coursegram_platform_access::{PlatformRole, User};
use sqlx::{FromRow, PgPool};
use std::str::FromStr;

use crate::db::StoreError;

/// Storage seam for user records.
#[async_trait]
pub trait UserStore: Send + Sync {
    /// Finds a user by their internal ID.
    async fn find_by_id(&self, id: UserId) -> coursegram_core::Result<Option<User>, StoreError>;

    /// Finds a user by their Telegram numeric id.
    async fn find_by_telegram_id(
        &self,
        telegram_id: i64,
    ) -> coursegram_core::Result<Option<User>, StoreError>;

    /// Creates a new user.
    async fn create(&self, user: &User) -> coursegram_core::Result<(), StoreError>;

    /// Updates an existing user (profile, role, and ban fields).
    async fn update(&self, user: &User) -> coursegram_core::Result<(), StoreError>;
}

/// Storage seam for expert memberships.
#[async_trait]
pub trait ExpertMemberStore: Send + Sync {
    /// Finds a membership by its composite key.
    async fn find(
        &self,
        expert_id: ExpertId,
        user_id: UserId,
    ) -> coursegram_core::Result<Option<ExpertMembership>, StoreError>;

    /// Lists all memberships of one expert scope.
    async fn list_for_expert(
        &self,
        expert_id: ExpertId,
    ) -> coursegram_core::Result<Vec<ExpertMembership>, StoreError>;

    /// Creates or updates a membership. The `(expert_id, user_id)` key is
    /// unique; a duplicate insert becomes a role update.
    async fn upsert(&self, membership: &ExpertMembership)
    -> coursegram_core::Result<(), StoreError>;

    /// Removes a membership. Returns false when none existed.
    async fn remove(
        &self,
        expert_id: ExpertId,
        user_id: UserId,
    ) -> coursegram_core::Result<bool, StoreError>;
}

/// Row type for user queries.
#[derive(FromRow)]
struct UserRow {
    id: String,
    telegram_id: i64,
    username: Option<String>,
    first_name: Option<String>,
    last_name: Option<String>,
    avatar_url: Option<String>,
    platform_role: String,
    banned_at: Option<DateTime<Utc>>,
    banned_reason: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl UserRow {
    fn try_into_user(self) -> Result<User, StoreError> {
        let id = UserId::from_str(&self.id).map_err(|e| StoreError::Decode {
            details: format!("invalid user id '{}': {}", self.id, e),
        })?;
        // The role column carries a CHECK constraint; a value that escapes
        // it anyway fails the request rather than granting anything.
        let platform_role =
            PlatformRole::from_str(&self.platform_role).map_err(|e| StoreError::Decode {
                details: e.to_string(),
            })?;

        Ok(User::with_all_fields(
            id,
            self.telegram_id,
            self.username,
            self.first_name,
            self.last_name,
            self.avatar_url,
            platform_role,
            self.banned_at,
            self.banned_reason,
            self.created_at,
            self.updated_at,
        ))
    }
}

/// Row type for membership queries.
#[derive(FromRow)]
struct MemberRow {
    expert_id: String,
    user_id: String,
    role: String,
    created_at: DateTime<Utc>,
}

impl MemberRow {
    fn try_into_membership(self) -> Result<ExpertMembership, StoreError> {
        let expert_id = ExpertId::from_str(&self.expert_id).map_err(|e| StoreError::Decode {
            details: format!("invalid expert id '{}': {}", self.expert_id, e),
        })?;
        let user_id = UserId::from_str(&self.user_id).map_err(|e| StoreError::Decode {
            details: format!("invalid user id '{}': {}", self.user_id, e),
        })?;
        let role = ExpertRole::from_str(&self.role).map_err(|e| StoreError::Decode {
            details: e.to_string(),
        })?;

        Ok(ExpertMembership::with_all_fields(
            expert_id,
            user_id,
            role,
            self.created_at,
        ))
    }
}

const USER_COLUMNS: &str = "id, telegram_id, username, first_name, last_name, avatar_url, \
                            platform_role, banned_at, banned_reason, created_at, updated_at";

/// Postgres-backed user repository.
pub struct PgUserStore {
    pool: PgPool,
}

impl PgUserStore {
    /// Creates a new user repository on the given pool.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl UserStore for PgUserStore {
    async fn find_by_id(&self, id: UserId) -> coursegram_core::Result<Option<User>, StoreError> {
        let row: Option<UserRow> = sqlx::query_as(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE id = $1"
        ))
        .bind(id.to_string())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| StoreError::database(&e))?;

        match row {
            Some(r) => Ok(Some(r.try_into_user()?)),
            None => Ok(None),
        }
    }

    async fn find_by_telegram_id(
        &self,
        telegram_id: i64,
    ) -> coursegram_core::Result<Option<User>, StoreError> {
        let row: Option<UserRow> = sqlx::query_as(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE telegram_id = $1"
        ))
        .bind(telegram_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| StoreError::database(&e))?;

        match row {
            Some(r) => Ok(Some(r.try_into_user()?)),
            None => Ok(None),
        }
    }

    async fn create(&self, user: &User) -> coursegram_core::Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO users (id, telegram_id, username, first_name, last_name, avatar_url,
                               platform_role, banned_at, banned_reason, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            "#,
        )
        .bind(user.id().to_string())
        .bind(user.telegram_id())
        .bind(user.username())
        .bind(user.first_name())
        .bind(user.last_name())
        .bind(user.avatar_url())
        .bind(user.platform_role().as_str())
        .bind(user.banned_at())
        .bind(user.banned_reason())
        .bind(user.created_at())
        .bind(user.updated_at())
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::database(&e))?;

        Ok(())
    }

    async fn update(&self, user: &User) -> coursegram_core::Result<(), StoreError> {
        sqlx::query(
            r#"
            UPDATE users
            SET username = $2, first_name = $3, last_name = $4, avatar_url = $5,
                platform_role = $6, banned_at = $7, banned_reason = $8, updated_at = $9
            WHERE id = $1
            "#,
        )
        .bind(user.id().to_string())
        .bind(user.username())
        .bind(user.first_name())
        .bind(user.last_name())
        .bind(user.avatar_url())
        .bind(user.platform_role().as_str())
        .bind(user.banned_at())
        .bind(user.banned_reason())
        .bind(user.updated_at())
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::database(&e))?;

        Ok(())
    }
}

/// Postgres-backed expert membership repository.
pub struct PgExpertMemberStore {
    pool: PgPool,
}

impl PgExpertMemberStore {
    /// Creates a new membership repository on the given pool.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ExpertMemberStore for PgExpertMemberStore {
    async fn find(
        &self,
        expert_id: ExpertId,
        user_id: UserId,
    ) -> coursegram_core::Result<Option<ExpertMembership>, StoreError> {
        let row: Option<MemberRow> = sqlx::query_as(
            r#"
            SELECT expert_id, user_id, role, created_at
            FROM expert_members
            WHERE expert_id = $1 AND user_id = $2
            "#,
        )
        .bind(expert_id.to_string())
        .bind(user_id.to_string())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| StoreError::database(&e))?;

        match row {
            Some(r) => Ok(Some(r.try_into_membership()?)),
            None => Ok(None),
        }
    }

    async fn list_for_expert(
        &self,
        expert_id: ExpertId,
    ) -> coursegram_core::Result<Vec<ExpertMembership>, StoreError> {
        let rows: Vec<MemberRow> = sqlx::query_as(
            r#"
            SELECT expert_id, user_id, role, created_at
            FROM expert_members
            WHERE expert_id = $1
            ORDER BY created_at
            "#,
        )
        .bind(expert_id.to_string())
        .fetch_all(&self.pool)
        .await
        .map_err(|e| StoreError::database(&e))?;

        let mut memberships = Vec::with_capacity(rows.len());
        for row in rows {
            memberships.push(row.try_into_membership()?);
        }
        Ok(memberships)
    }

    async fn upsert(
        &self,
        membership: &ExpertMembership,
    ) -> coursegram_core::Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO expert_members (expert_id, user_id, role, created_at)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (expert_id, user_id) DO UPDATE SET role = EXCLUDED.role
            "#,
        )
        .bind(membership.expert_id().to_string())
        .bind(membership.user_id().to_string())
        .bind(membership.role().as_str())
        .bind(membership.created_at())
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::database(&e))?;

        Ok(())
    }

    async fn remove(
        &self,
        expert_id: ExpertId,
        user_id: UserId,
    ) -> coursegram_core::Result<bool, StoreError> {
        let result = sqlx::query(
            r#"
            DELETE FROM expert_members
            WHERE expert_id = $1 AND user_id = $2
            "#,
        )
        .bind(expert_id.to_string())
        .bind(user_id.to_string())
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::database(&e))?;

        Ok(result.rows_affected() > 0)
    }
}
