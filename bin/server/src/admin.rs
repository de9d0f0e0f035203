//! Admin endpoints: the audit read path and user administration.
//!
//! Every route in this module sits behind the platform `admin` guard; the
//! mutations additionally record their own audit entries, so operator
//! actions are traceable the same way denials are.

use axum::{
    Json,
    extract::{Path, Query, State},
};
use chrono::{DateTime, Utc};
use coursegram_core::UserId;
use coursegram_platform_access::PlatformRole;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::str::FromStr;
use std::sync::Arc;

use crate::audit::{
    AuditCursor, AuditEntry, AuditFilter, DEFAULT_PAGE_SIZE, NewAuditEntry, action,
};
use crate::auth::routes::UserResponse;
use crate::auth::{AppState, CurrentUser};
use crate::error::ApiError;
use crate::trace::TraceId;

/// Query parameters for `GET /admin/audit`.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditQuery {
    actor_user_id: Option<String>,
    action: Option<String>,
    entity_type: Option<String>,
    entity_id: Option<String>,
    trace_id: Option<String>,
    from: Option<String>,
    to: Option<String>,
    limit: Option<i64>,
    cursor: Option<String>,
}

/// Wire shape of one audit entry.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditEntryResponse {
    id: String,
    created_at: DateTime<Utc>,
    actor_user_id: Option<String>,
    action: String,
    entity_type: Option<String>,
    entity_id: Option<String>,
    trace_id: Option<String>,
    meta: serde_json::Value,
}

impl From<AuditEntry> for AuditEntryResponse {
    fn from(entry: AuditEntry) -> Self {
        Self {
            id: entry.id.to_string(),
            created_at: entry.created_at,
            actor_user_id: entry.actor_user_id.map(|id| id.to_string()),
            action: entry.action,
            entity_type: entry.entity_type,
            entity_id: entry.entity_id,
            trace_id: entry.trace_id,
            meta: entry.meta,
        }
    }
}

/// Wire shape of one audit page.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditPageResponse {
    items: Vec<AuditEntryResponse>,
    #[serde(skip_serializing_if = "Option::is_none")]
    next_cursor: Option<String>,
}

/// `GET /admin/audit` — cursor-paginated, multi-filter read over the trail.
pub async fn list_audit(
    State(state): State<Arc<AppState>>,
    trace: TraceId,
    Query(query): Query<AuditQuery>,
) -> Result<Json<AuditPageResponse>, ApiError> {
    let actor_user_id = match &query.actor_user_id {
        Some(raw) => Some(
            UserId::from_str(raw)
                .map_err(|_| ApiError::malformed("invalid actorUserId").with_trace(&trace))?,
        ),
        None => None,
    };

    let filter = AuditFilter {
        actor_user_id,
        action: query.action,
        entity_type: query.entity_type,
        entity_id: query.entity_id,
        trace_id: query.trace_id,
        from: parse_instant(query.from.as_deref(), "from", &trace)?,
        to: parse_instant(query.to.as_deref(), "to", &trace)?,
    };

    let cursor = match &query.cursor {
        Some(raw) => Some(
            AuditCursor::decode(raw)
                .map_err(|_| ApiError::malformed("invalid cursor").with_trace(&trace))?,
        ),
        None => None,
    };

    let page = state
        .audit
        .list(&filter, cursor, query.limit.unwrap_or(DEFAULT_PAGE_SIZE))
        .await
        .map_err(|e| {
            tracing::error!(error = %e, "audit query failed");
            ApiError::internal().with_trace(&trace)
        })?;

    Ok(Json(AuditPageResponse {
        items: page.items.into_iter().map(Into::into).collect(),
        next_cursor: page.next_cursor,
    }))
}

fn parse_instant(
    raw: Option<&str>,
    field: &str,
    trace: &TraceId,
) -> Result<Option<DateTime<Utc>>, ApiError> {
    match raw {
        None => Ok(None),
        Some(raw) => DateTime::parse_from_rfc3339(raw)
            .map(|dt| Some(dt.with_timezone(&Utc)))
            .map_err(|_| ApiError::malformed(format!("invalid {field} timestamp")).with_trace(trace)),
    }
}

/// Wire shape of the distinct-actions listing.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ActionsResponse {
    actions: Vec<String>,
}

/// `GET /admin/audit/actions` — distinct action names in the trail.
pub async fn list_audit_actions(
    State(state): State<Arc<AppState>>,
    trace: TraceId,
) -> Result<Json<ActionsResponse>, ApiError> {
    let actions = state.audit.distinct_actions().await.map_err(|e| {
        tracing::error!(error = %e, "audit actions query failed");
        ApiError::internal().with_trace(&trace)
    })?;

    Ok(Json(ActionsResponse { actions }))
}

/// `PUT /admin/users/{user_id}/role` — changes a user's platform role.
pub async fn set_platform_role(
    State(state): State<Arc<AppState>>,
    trace: TraceId,
    CurrentUser(actor): CurrentUser,
    Path(user_id): Path<String>,
    Json(body): Json<serde_json::Value>,
) -> Result<Json<UserResponse>, ApiError> {
    let role = body
        .get("role")
        .and_then(|v| v.as_str())
        .and_then(|raw| PlatformRole::from_str(raw).ok())
        .ok_or_else(|| ApiError::malformed("role is required").with_trace(&trace))?;

    let mut user = load_user(&state, &user_id, &trace).await?;
    let old_role = user.platform_role();
    user.set_platform_role(role);
    state.users.update(&user).await.map_err(|e| {
        tracing::error!(error = %e, "role update failed");
        ApiError::internal().with_trace(&trace)
    })?;

    record_admin_action(
        &state,
        &trace,
        actor.id(),
        action::ADMIN_USER_ROLE_CHANGED,
        user.id(),
        json!({
            "targetUserId": user.id().to_string(),
            "oldRole": old_role.as_str(),
            "newRole": role.as_str(),
        }),
    )
    .await?;

    Ok(Json(UserResponse::from(&user)))
}

/// `POST /admin/users/{user_id}/ban` — bans a user.
pub async fn ban_user(
    State(state): State<Arc<AppState>>,
    trace: TraceId,
    CurrentUser(actor): CurrentUser,
    Path(user_id): Path<String>,
    body: Option<Json<serde_json::Value>>,
) -> Result<Json<UserResponse>, ApiError> {
    let reason = body
        .as_ref()
        .and_then(|Json(body)| body.get("reason"))
        .and_then(|v| v.as_str())
        .map(str::to_string);

    let mut user = load_user(&state, &user_id, &trace).await?;
    user.ban(reason.clone());
    state.users.update(&user).await.map_err(|e| {
        tracing::error!(error = %e, "ban update failed");
        ApiError::internal().with_trace(&trace)
    })?;

    record_admin_action(
        &state,
        &trace,
        actor.id(),
        action::ADMIN_USER_BANNED,
        user.id(),
        json!({
            "targetUserId": user.id().to_string(),
            "reason": reason,
        }),
    )
    .await?;

    Ok(Json(UserResponse::from(&user)))
}

/// `DELETE /admin/users/{user_id}/ban` — lifts a ban.
pub async fn unban_user(
    State(state): State<Arc<AppState>>,
    trace: TraceId,
    CurrentUser(actor): CurrentUser,
    Path(user_id): Path<String>,
) -> Result<Json<UserResponse>, ApiError> {
    let mut user = load_user(&state, &user_id, &trace).await?;
    user.unban();
    state.users.update(&user).await.map_err(|e| {
        tracing::error!(error = %e, "unban update failed");
        ApiError::internal().with_trace(&trace)
    })?;

    record_admin_action(
        &state,
        &trace,
        actor.id(),
        action::ADMIN_USER_UNBANNED,
        user.id(),
        json!({
            "targetUserId": user.id().to_string(),
        }),
    )
    .await?;

    Ok(Json(UserResponse::from(&user)))
}

async fn load_user(
    state: &AppState,
    raw_id: &str,
    trace: &TraceId,
) -> Result<coursegram_platform_access::User, ApiError> {
    let user_id = UserId::from_str(raw_id)
        .map_err(|_| ApiError::malformed("invalid user id").with_trace(trace))?;

    state
        .users
        .find_by_id(user_id)
        .await
        .map_err(|e| {
            tracing::error!(error = %e, "user lookup failed");
            ApiError::internal().with_trace(trace)
        })?
        .ok_or_else(|| ApiError::not_found("user not found").with_trace(trace))
}

async fn record_admin_action(
    state: &AppState,
    trace: &TraceId,
    actor: UserId,
    admin_action: &str,
    target: UserId,
    meta: serde_json::Value,
) -> Result<(), ApiError> {
    let entry = NewAuditEntry::new(admin_action)
        .with_actor(Some(actor))
        .with_entity("user", target.to_string())
        .with_trace(trace.as_str())
        .with_meta(meta);

    state.audit.record(entry).await.map_err(|e| {
        tracing::error!(error = %e, "audit write failed in strict mode");
        ApiError::internal().with_trace(trace)
    })
}
