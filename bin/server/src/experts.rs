//! Expert-scoped endpoints: membership management.
//!
//! These routes sit behind the expert-role guard; the admitted scope and
//! the caller's role arrive through the [`ExpertContext`] extension. Member
//! mutations are audited like the admin mutations are.

use axum::{
    Json,
    extract::{Path, State},
};
use chrono::{DateTime, Utc};
use coursegram_authz::{ExpertMembership, ExpertRole};
use coursegram_core::UserId;
use serde::Serialize;
use serde_json::json;
use std::str::FromStr;
use std::sync::Arc;

use crate::audit::{NewAuditEntry, action};
use crate::auth::{AppState, CurrentUser};
use crate::error::ApiError;
use crate::guard::ExpertContext;
use crate::trace::TraceId;

/// Wire shape of one membership.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MembershipResponse {
    expert_id: String,
    user_id: String,
    role: ExpertRole,
    created_at: DateTime<Utc>,
}

impl From<&ExpertMembership> for MembershipResponse {
    fn from(membership: &ExpertMembership) -> Self {
        Self {
            expert_id: membership.expert_id().to_string(),
            user_id: membership.user_id().to_string(),
            role: membership.role(),
            created_at: membership.created_at(),
        }
    }
}

/// Wire shape of the member listing.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MembersResponse {
    members: Vec<MembershipResponse>,
}

/// `GET /experts/{expert_id}/members` — lists the scope's members.
pub async fn list_members(
    State(state): State<Arc<AppState>>,
    trace: TraceId,
    ctx: ExpertContext,
) -> Result<Json<MembersResponse>, ApiError> {
    let members = state
        .members
        .list_for_expert(ctx.expert_id)
        .await
        .map_err(|e| {
            tracing::error!(error = %e, "membership listing failed");
            ApiError::internal().with_trace(&trace)
        })?;

    Ok(Json(MembersResponse {
        members: members.iter().map(Into::into).collect(),
    }))
}

/// `PUT /experts/{expert_id}/members/{user_id}` — creates or updates a
/// membership. A duplicate insert becomes a role update through the
/// composite-key upsert.
pub async fn upsert_member(
    State(state): State<Arc<AppState>>,
    trace: TraceId,
    CurrentUser(actor): CurrentUser,
    ctx: ExpertContext,
    Path((_, user_id)): Path<(String, String)>,
    Json(body): Json<serde_json::Value>,
) -> Result<Json<MembershipResponse>, ApiError> {
    let role = body
        .get("role")
        .and_then(|v| v.as_str())
        .and_then(|raw| ExpertRole::from_str(raw).ok())
        .ok_or_else(|| ApiError::malformed("role is required").with_trace(&trace))?;

    let target = UserId::from_str(&user_id)
        .map_err(|_| ApiError::malformed("invalid user id").with_trace(&trace))?;

    // The member must be a real account; memberships never create users.
    let exists = state.users.find_by_id(target).await.map_err(|e| {
        tracing::error!(error = %e, "user lookup failed");
        ApiError::internal().with_trace(&trace)
    })?;
    if exists.is_none() {
        return Err(ApiError::not_found("user not found").with_trace(&trace));
    }

    let membership = ExpertMembership::new(ctx.expert_id, target, role);
    state.members.upsert(&membership).await.map_err(|e| {
        tracing::error!(error = %e, "membership upsert failed");
        ApiError::internal().with_trace(&trace)
    })?;

    record_member_action(
        &state,
        &trace,
        actor.id(),
        action::EXPERT_MEMBER_UPSERTED,
        &membership,
        json!({
            "expertId": ctx.expert_id.to_string(),
            "targetUserId": target.to_string(),
            "role": role.as_str(),
        }),
    )
    .await?;

    Ok(Json(MembershipResponse::from(&membership)))
}

/// `DELETE /experts/{expert_id}/members/{user_id}` — removes a membership.
pub async fn remove_member(
    State(state): State<Arc<AppState>>,
    trace: TraceId,
    CurrentUser(actor): CurrentUser,
    ctx: ExpertContext,
    Path((_, user_id)): Path<(String, String)>,
) -> Result<Json<MembersResponse>, ApiError> {
    let target = UserId::from_str(&user_id)
        .map_err(|_| ApiError::malformed("invalid user id").with_trace(&trace))?;

    let removed = state
        .members
        .remove(ctx.expert_id, target)
        .await
        .map_err(|e| {
            tracing::error!(error = %e, "membership removal failed");
            ApiError::internal().with_trace(&trace)
        })?;
    if !removed {
        return Err(ApiError::not_found("membership not found").with_trace(&trace));
    }

    let entry = NewAuditEntry::new(action::EXPERT_MEMBER_REMOVED)
        .with_actor(Some(actor.id()))
        .with_entity("expert_member", format!("{}/{}", ctx.expert_id, target))
        .with_trace(trace.as_str())
        .with_meta(json!({
            "expertId": ctx.expert_id.to_string(),
            "targetUserId": target.to_string(),
        }));
    state.audit.record(entry).await.map_err(|e| {
        tracing::error!(error = %e, "audit write failed in strict mode");
        ApiError::internal().with_trace(&trace)
    })?;

    let members = state
        .members
        .list_for_expert(ctx.expert_id)
        .await
        .map_err(|e| {
            tracing::error!(error = %e, "membership listing failed");
            ApiError::internal().with_trace(&trace)
        })?;

    Ok(Json(MembersResponse {
        members: members.iter().map(Into::into).collect(),
    }))
}

async fn record_member_action(
    state: &AppState,
    trace: &TraceId,
    actor: UserId,
    member_action: &str,
    membership: &ExpertMembership,
    meta: serde_json::Value,
) -> Result<(), ApiError> {
    let entry = NewAuditEntry::new(member_action)
        .with_actor(Some(actor))
        .with_entity(
            "expert_member",
            format!("{}/{}", membership.expert_id(), membership.user_id()),
        )
        .with_trace(trace.as_str())
        .with_meta(meta);

    state.audit.record(entry).await.map_err(|e| {
        tracing::error!(error = %e, "audit write failed in strict mode");
        ApiError::internal().with_trace(trace)
    })
}
