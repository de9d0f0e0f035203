//! Audit trail storage.
//!
//! The Postgres implementation appends rows and serves the keyset-paginated
//! read path. The list query is assembled dynamically from the optional
//! filters; the cursor predicate is a strict tuple comparison against the
//! `(created_at, id)` sort key, so pages stay stable under concurrent
//! inserts.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use coursegram_core::{AuditEntryId, UserId};
use sqlx::{FromRow, PgPool, QueryBuilder};
use std::str::FromStr;

use super::StoreError;
use crate::audit::{AuditCursor, AuditEntry, AuditFilter};

/// Storage seam for the audit trail.
#[async_trait]
pub trait AuditStore: Send + Sync {
    /// Appends one entry. The trail is append-only; there is no update or
    /// delete path.
    async fn append(&self, entry: &AuditEntry) -> coursegram_core::Result<(), StoreError>;

    /// Lists up to `limit` entries matching the filter, newest first,
    /// strictly after the cursor's position when one is given.
    async fn list(
        &self,
        filter: &AuditFilter,
        cursor: Option<&AuditCursor>,
        limit: i64,
    ) -> coursegram_core::Result<Vec<AuditEntry>, StoreError>;

    /// Returns the distinct action names present in the trail.
    async fn distinct_actions(&self) -> coursegram_core::Result<Vec<String>, StoreError>;
}

/// Row type for audit queries.
#[derive(FromRow)]
struct AuditRow {
    id: String,
    created_at: DateTime<Utc>,
    actor_user_id: Option<String>,
    action: String,
    entity_type: Option<String>,
    entity_id: Option<String>,
    trace_id: Option<String>,
    meta: serde_json::Value,
}

impl AuditRow {
    fn try_into_entry(self) -> Result<AuditEntry, StoreError> {
        let id = AuditEntryId::from_str(&self.id).map_err(|e| StoreError::Decode {
            details: format!("invalid audit entry id '{}': {}", self.id, e),
        })?;
        let actor_user_id = match self.actor_user_id {
            Some(raw) => Some(UserId::from_str(&raw).map_err(|e| StoreError::Decode {
                details: format!("invalid actor user id '{raw}': {e}"),
            })?),
            None => None,
        };

        Ok(AuditEntry {
            id,
            created_at: self.created_at,
            actor_user_id,
            action: self.action,
            entity_type: self.entity_type,
            entity_id: self.entity_id,
            trace_id: self.trace_id,
            meta: self.meta,
        })
    }
}

/// Postgres-backed audit store.
pub struct PgAuditStore {
    pool: PgPool,
}

impl PgAuditStore {
    /// Creates a new audit store on the given pool.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl AuditStore for PgAuditStore {
    async fn append(&self, entry: &AuditEntry) -> coursegram_core::Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO audit_log (id, created_at, actor_user_id, action, entity_type, entity_id, trace_id, meta)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(entry.id.to_string())
        .bind(entry.created_at)
        .bind(entry.actor_user_id.map(|id| id.to_string()))
        .bind(entry.action.as_str())
        .bind(entry.entity_type.as_deref())
        .bind(entry.entity_id.as_deref())
        .bind(entry.trace_id.as_deref())
        .bind(entry.meta.clone())
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::database(&e))?;

        Ok(())
    }

    async fn list(
        &self,
        filter: &AuditFilter,
        cursor: Option<&AuditCursor>,
        limit: i64,
    ) -> coursegram_core::Result<Vec<AuditEntry>, StoreError> {
        let mut builder = QueryBuilder::new(
            "SELECT id, created_at, actor_user_id, action, entity_type, entity_id, trace_id, meta \
             FROM audit_log WHERE TRUE",
        );

        if let Some(actor) = filter.actor_user_id {
            builder.push(" AND actor_user_id = ");
            builder.push_bind(actor.to_string());
        }
        if let Some(action) = &filter.action {
            builder.push(" AND action = ");
            builder.push_bind(action.clone());
        }
        if let Some(entity_type) = &filter.entity_type {
            builder.push(" AND entity_type = ");
            builder.push_bind(entity_type.clone());
        }
        if let Some(entity_id) = &filter.entity_id {
            builder.push(" AND entity_id = ");
            builder.push_bind(entity_id.clone());
        }
        if let Some(trace_id) = &filter.trace_id {
            builder.push(" AND trace_id = ");
            builder.push_bind(trace_id.clone());
        }
        if let Some(from) = filter.from {
            builder.push(" AND created_at >= ");
            builder.push_bind(from);
        }
        if let Some(to) = filter.to {
            builder.push(" AND created_at <= ");
            builder.push_bind(to);
        }
        if let Some(cursor) = cursor {
            builder.push(" AND (created_at, id) < (");
            builder.push_bind(cursor.created_at);
            builder.push(", ");
            builder.push_bind(cursor.id.to_string());
            builder.push(")");
        }

        builder.push(" ORDER BY created_at DESC, id DESC LIMIT ");
        builder.push_bind(limit);

        let rows: Vec<AuditRow> = builder
            .build_query_as()
            .fetch_all(&self.pool)
            .await
            .map_err(|e| StoreError::database(&e))?;

        let mut entries = Vec::with_capacity(rows.len());
        for row in rows {
            entries.push(row.try_into_entry()?);
        }
        Ok(entries)
    }

    async fn distinct_actions(&self) -> coursegram_core::Result<Vec<String>, StoreError> {
        let actions: Vec<(String,)> =
            sqlx::query_as("SELECT DISTINCT action FROM audit_log ORDER BY action")
                .fetch_all(&self.pool)
                .await
                .map_err(|e| StoreError::database(&e))?;

        Ok(actions.into_iter().map(|(action,)| action).collect())
    }
}
