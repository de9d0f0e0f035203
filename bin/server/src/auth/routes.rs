//! Authentication routes: Telegram login and the current-user endpoint.

use axum::{Json, extract::State};
use chrono::{DateTime, Utc};
use coursegram_platform_access::{PlatformRole, User, telegram};
use serde::Serialize;
use std::sync::Arc;

use super::middleware::{CurrentUser, deny_banned};
use super::AppState;
use crate::error::{ApiError, ApiErrorKind};
use crate::trace::TraceId;

/// Wire shape of a user in API responses.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserResponse {
    /// Internal user id.
    pub id: String,
    /// Telegram numeric id.
    pub telegram_id: i64,
    /// Telegram username, if any.
    pub username: Option<String>,
    /// First name, if any.
    pub first_name: Option<String>,
    /// Last name, if any.
    pub last_name: Option<String>,
    /// Avatar URL, if any.
    pub avatar_url: Option<String>,
    /// Platform-wide role.
    pub platform_role: PlatformRole,
    /// When the account was banned, if it is.
    pub banned_at: Option<DateTime<Utc>>,
    /// When the account was created.
    pub created_at: DateTime<Utc>,
}

impl From<&User> for UserResponse {
    fn from(user: &User) -> Self {
        Self {
            id: user.id().to_string(),
            telegram_id: user.telegram_id(),
            username: user.username().map(str::to_string),
            first_name: user.first_name().map(str::to_string),
            last_name: user.last_name().map(str::to_string),
            avatar_url: user.avatar_url().map(str::to_string),
            platform_role: user.platform_role(),
            banned_at: user.banned_at(),
            created_at: user.created_at(),
        }
    }
}

/// Response to a successful login.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginResponse {
    /// The authenticated user.
    pub user: UserResponse,
    /// Bearer token for subsequent requests.
    pub access_token: String,
}

/// `POST /auth/telegram` — verifies a Mini-App `initData` blob and mints a
/// session token.
///
/// First login creates the user record; later logins refresh the stored
/// Telegram profile. A banned account is rejected here with the denial
/// audited, before any token is issued.
pub async fn telegram_login(
    State(state): State<Arc<AppState>>,
    trace: TraceId,
    Json(body): Json<serde_json::Value>,
) -> Result<Json<LoginResponse>, ApiError> {
    let init_data = body
        .get("initData")
        .and_then(|v| v.as_str())
        .ok_or_else(|| ApiError::malformed("initData is required").with_trace(&trace))?;

    let verified = telegram::verify_init_data(
        init_data,
        &state.telegram.bot_token,
        state.telegram.max_auth_age_seconds,
    )
    .map_err(|e| ApiError::from(e).with_trace(&trace))?;

    let existing = state
        .users
        .find_by_telegram_id(verified.telegram_id)
        .await
        .map_err(|e| {
            tracing::error!(error = %e, "user lookup failed during login");
            ApiError::internal().with_trace(&trace)
        })?;

    let user = match existing {
        Some(mut user) => {
            user.update_profile(
                verified.username,
                verified.first_name,
                verified.last_name,
                verified.photo_url,
            );
            state.users.update(&user).await.map_err(|e| {
                tracing::error!(error = %e, "user update failed during login");
                ApiError::internal().with_trace(&trace)
            })?;
            user
        }
        None => {
            let mut user = User::new(verified.telegram_id);
            user.update_profile(
                verified.username,
                verified.first_name,
                verified.last_name,
                verified.photo_url,
            );
            state.users.create(&user).await.map_err(|e| {
                tracing::error!(error = %e, "user creation failed during login");
                ApiError::internal().with_trace(&trace)
            })?;
            tracing::info!(user_id = %user.id(), "created user on first login");
            user
        }
    };

    if user.is_banned() {
        deny_banned(&state, &trace, user.id(), "/auth/telegram", "POST").await?;
        return Err(ApiError::new(ApiErrorKind::UserBanned).with_trace(&trace));
    }

    let access_token = state
        .tokens
        .issue(user.id(), user.telegram_id())
        .map_err(|e| ApiError::from(e).with_trace(&trace))?;

    Ok(Json(LoginResponse {
        user: UserResponse::from(&user),
        access_token,
    }))
}

/// `GET /me` — the authenticated caller's own record.
pub async fn me(CurrentUser(user): CurrentUser) -> Json<UserResponse> {
    Json(UserResponse::from(&user))
}
