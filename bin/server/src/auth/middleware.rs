//! Authentication middleware and extractors for Axum.
//!
//! `require_auth` wraps every route except the login endpoint: it validates
//! the bearer token, resolves the user record, and enforces the
//! banned-account gate before any role guard runs. Handlers downstream read
//! the caller through the `CurrentUser` extractor.

use axum::{
    extract::{FromRequestParts, Request, State},
    http::request::Parts,
    middleware::Next,
    response::Response,
};
use axum_extra::{
    TypedHeader,
    headers::{Authorization, authorization::Bearer},
};
use coursegram_platform_access::User;
use serde_json::json;
use std::sync::Arc;

use super::AppState;
use crate::audit::{NewAuditEntry, action};
use crate::error::{ApiError, ApiErrorKind};
use crate::trace::TraceId;

/// The authenticated caller, attached to the request by `require_auth`.
#[derive(Debug, Clone)]
pub struct CurrentUser(pub User);

impl<S> FromRequestParts<S> for CurrentUser
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<CurrentUser>()
            .cloned()
            .ok_or_else(|| ApiError::new(ApiErrorKind::InvalidToken))
    }
}

/// Middleware enforcing authentication on everything behind it.
///
/// Order of gates: token validation, user resolution, ban check. A banned
/// user is denied here — with the denial audited — so no role guard ever
/// evaluates a banned account. The user record is attached as a
/// [`CurrentUser`] extension on success.
pub async fn require_auth(
    State(state): State<Arc<AppState>>,
    trace: TraceId,
    bearer: Option<TypedHeader<Authorization<Bearer>>>,
    mut req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let Some(TypedHeader(Authorization(bearer))) = bearer else {
        return Err(ApiError::new(ApiErrorKind::InvalidToken).with_trace(&trace));
    };

    let identity = state
        .tokens
        .validate(bearer.token())
        .map_err(|e| ApiError::from(e).with_trace(&trace))?;

    let user = state
        .users
        .find_by_id(identity.user_id)
        .await
        .map_err(|e| {
            tracing::error!(error = %e, "user lookup failed during authentication");
            ApiError::internal().with_trace(&trace)
        })?;

    // A token naming an unknown subject is indistinguishable from a forged
    // one at this boundary.
    let Some(user) = user else {
        return Err(ApiError::new(ApiErrorKind::InvalidToken).with_trace(&trace));
    };

    if user.is_banned() {
        deny_banned(&state, &trace, user.id(), req.uri().path(), req.method().as_str()).await?;
        return Err(ApiError::new(ApiErrorKind::UserBanned).with_trace(&trace));
    }

    req.extensions_mut().insert(CurrentUser(user));
    Ok(next.run(req).await)
}

/// Records the banned-account denial. Awaited before the 403 leaves so the
/// audit write happens-before the response.
pub(crate) async fn deny_banned(
    state: &AppState,
    trace: &TraceId,
    user_id: coursegram_core::UserId,
    path: &str,
    method: &str,
) -> Result<(), ApiError> {
    tracing::info!(user_id = %user_id, path, "denied: account is banned");

    let entry = NewAuditEntry::new(action::REQUEST_BLOCKED_BANNED)
        .with_actor(Some(user_id))
        .with_entity("route", path)
        .with_trace(trace.as_str())
        .with_meta(json!({
            "path": path,
            "method": method,
        }));

    state.audit.record(entry).await.map_err(|e| {
        tracing::error!(error = %e, "audit write failed in strict mode");
        ApiError::internal().with_trace(trace)
    })
}
