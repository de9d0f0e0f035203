//! Request-time authorization guards.
//!
//! A route declares the platform and/or expert role it requires by wrapping
//! itself in these middleware functions; routes without a guard are
//! authenticated-only. Guards run after `require_auth`, are stateless per
//! request, and never cache role lookups across requests.
//!
//! Every role denial awaits its audit entry before the response is built —
//! the deny-audit invariant — and a storage failure during a lookup is a
//! 500, never a silent admit.

use axum::{
    extract::{RawPathParams, Request, State},
    middleware::Next,
    response::Response,
};
use coursegram_authz::{ExpertAccess, ExpertRole, evaluate_expert_access, is_allowed};
use coursegram_core::ExpertId;
use coursegram_platform_access::PlatformRole;
use serde_json::json;
use std::str::FromStr;
use std::sync::Arc;

use crate::audit::{NewAuditEntry, action};
use crate::auth::{AppState, CurrentUser};
use crate::error::{ApiError, ApiErrorKind};
use crate::trace::TraceId;

/// Path parameter carrying the expert scope.
const EXPERT_ID_PARAM: &str = "expert_id";

/// Development/test-only fallback header for the expert scope. Never
/// honored in production.
const EXPERT_ID_HEADER: &str = "x-expert-id";

/// State for the platform-role guard on one route.
#[derive(Clone)]
pub struct PlatformRoleGuard {
    state: Arc<AppState>,
    required: PlatformRole,
}

impl PlatformRoleGuard {
    /// Creates a guard requiring the given platform role.
    #[must_use]
    pub fn new(state: Arc<AppState>, required: PlatformRole) -> Self {
        Self { state, required }
    }
}

/// Middleware enforcing a required platform role.
pub async fn platform_role(
    State(guard): State<PlatformRoleGuard>,
    trace: TraceId,
    req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let user = req.extensions().get::<CurrentUser>().map(|c| c.0.clone());

    if !is_allowed(
        user.as_ref().map(|u| u.platform_role()),
        Some(guard.required),
    ) {
        let path = req.uri().path().to_string();
        tracing::info!(
            actor = ?user.as_ref().map(|u| u.id()),
            required = %guard.required,
            path,
            "denied: insufficient platform role"
        );

        let entry = NewAuditEntry::new(action::RBAC_DENIED_PLATFORM_ROLE)
            .with_actor(user.as_ref().map(|u| u.id()))
            .with_entity("route", path.clone())
            .with_trace(trace.as_str())
            .with_meta(json!({
                "requiredRole": guard.required.as_str(),
                "userRole": user.as_ref().map(|u| u.platform_role().as_str()),
                "path": path,
                "method": req.method().as_str(),
            }));
        guard.state.audit.record(entry).await.map_err(|e| {
            tracing::error!(error = %e, "audit write failed in strict mode");
            ApiError::internal().with_trace(&trace)
        })?;

        return Err(ApiError::new(ApiErrorKind::ForbiddenPlatformRole).with_trace(&trace));
    }

    Ok(next.run(req).await)
}

/// The expert scope a request was admitted under.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExpertContext {
    /// The expert (tenant) scope.
    pub expert_id: ExpertId,
    /// The caller's role within the scope.
    pub role: ExpertRole,
}

/// State for the expert-role guard on one route.
#[derive(Clone)]
pub struct ExpertRoleGuard {
    state: Arc<AppState>,
    required: ExpertRole,
}

impl ExpertRoleGuard {
    /// Creates a guard requiring the given expert-scoped role.
    #[must_use]
    pub fn new(state: Arc<AppState>, required: ExpertRole) -> Self {
        Self { state, required }
    }
}

/// Middleware enforcing a required expert-scoped role.
///
/// The scope comes from the `expert_id` path parameter. Outside production
/// an `x-expert-id` header may stand in — this is the single site where
/// [`crate::config::RuntimeMode`] is consulted. A request with no
/// resolvable scope is a 400, distinct from the role denials.
pub async fn expert_role(
    State(guard): State<ExpertRoleGuard>,
    trace: TraceId,
    params: RawPathParams,
    mut req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let from_path = params
        .iter()
        .find(|(name, _)| *name == EXPERT_ID_PARAM)
        .map(|(_, value)| value.to_string());

    let raw_scope = match from_path {
        Some(value) => Some(value),
        None if !guard.state.mode.is_production() => req
            .headers()
            .get(EXPERT_ID_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string),
        None => None,
    };

    let expert_id = raw_scope
        .as_deref()
        .and_then(|raw| ExpertId::from_str(raw).ok());
    let Some(expert_id) = expert_id else {
        tracing::debug!(path = req.uri().path(), "expert route called without a resolvable scope");
        return Err(ApiError::new(ApiErrorKind::ExpertContextRequired).with_trace(&trace));
    };

    // `require_auth` always runs first; a missing identity here means the
    // route was mounted without it.
    let Some(CurrentUser(user)) = req.extensions().get::<CurrentUser>().cloned() else {
        return Err(ApiError::new(ApiErrorKind::InvalidToken).with_trace(&trace));
    };

    let membership = guard
        .state
        .members
        .find(expert_id, user.id())
        .await
        .map_err(|e| {
            tracing::error!(error = %e, "membership lookup failed");
            ApiError::internal().with_trace(&trace)
        })?;

    let req_path = req.uri().path().to_string();
    let req_method = req.method().clone();

    match evaluate_expert_access(membership.as_ref(), guard.required) {
        ExpertAccess::Granted { role } => {
            req.extensions_mut().insert(ExpertContext { expert_id, role });
            Ok(next.run(req).await)
        }
        ExpertAccess::NotMember => {
            deny_expert(
                &guard,
                &trace,
                req_path,
                req_method,
                expert_id,
                user.id(),
                action::RBAC_DENIED_EXPERT_MEMBERSHIP,
                None,
            )
            .await?;
            Err(ApiError::new(ApiErrorKind::ExpertMembershipRequired).with_trace(&trace))
        }
        ExpertAccess::InsufficientRole { actual } => {
            deny_expert(
                &guard,
                &trace,
                req_path,
                req_method,
                expert_id,
                user.id(),
                action::RBAC_DENIED_EXPERT_ROLE,
                Some(actual),
            )
            .await?;
            Err(ApiError::new(ApiErrorKind::ForbiddenExpertRole).with_trace(&trace))
        }
    }
}

async fn deny_expert(
    guard: &ExpertRoleGuard,
    trace: &TraceId,
    path: String,
    method: axum::http::Method,
    expert_id: ExpertId,
    actor: coursegram_core::UserId,
    denial_action: &str,
    actual_role: Option<ExpertRole>,
) -> Result<(), ApiError> {
    tracing::info!(
        actor = %actor,
        expert_id = %expert_id,
        required = %guard.required,
        path,
        "denied: {}",
        denial_action
    );

    let entry = NewAuditEntry::new(denial_action)
        .with_actor(Some(actor))
        .with_entity("route", path.clone())
        .with_trace(trace.as_str())
        .with_meta(json!({
            "expertId": expert_id.to_string(),
            "requiredRole": guard.required.as_str(),
            "userRole": actual_role.map(ExpertRole::as_str),
            "path": path,
            "method": method.as_str(),
        }));

    guard.state.audit.record(entry).await.map_err(|e| {
        tracing::error!(error = %e, "audit write failed in strict mode");
        ApiError::internal().with_trace(trace)
    })
}

impl<S> axum::extract::FromRequestParts<S> for ExpertContext
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut axum::http::request::Parts,
        _state: &S,
    ) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<ExpertContext>()
            .copied()
            .ok_or_else(|| ApiError::new(ApiErrorKind::ExpertContextRequired))
    }
}