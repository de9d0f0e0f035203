//! The HTTP error taxonomy.
//!
//! Every failure a client can observe is normalized into one of the closed
//! set of machine-readable codes below. Cryptographic and parser failures
//! from the libraries never pass through raw; they are mapped here at the
//! boundary. Response bodies carry the code, a user-safe message, and the
//! request's trace id — nothing else.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use coursegram_platform_access::{InitDataError, TokenError};
use serde::Serialize;

use crate::trace::TraceId;

/// The closed set of API error kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApiErrorKind {
    /// Structurally invalid input (bad body, bad cursor, bad id).
    MalformedInput,
    /// Telegram `initData` signature mismatch.
    InvalidSignature,
    /// Telegram `initData` outside the freshness window.
    Expired,
    /// Session token failed validation, for any reason.
    InvalidToken,
    /// The account is banned.
    UserBanned,
    /// An expert-scoped route was called without a resolvable expert scope.
    ExpertContextRequired,
    /// The caller holds no membership in the expert scope.
    ExpertMembershipRequired,
    /// The caller's expert-scoped role is below the requirement.
    ForbiddenExpertRole,
    /// The caller's platform role is below the requirement.
    ForbiddenPlatformRole,
    /// The referenced entity does not exist.
    NotFound,
    /// An internal fault; the request cannot be completed.
    Internal,
}

impl ApiErrorKind {
    /// The stable machine-readable code clients match on.
    #[must_use]
    pub const fn code(self) -> &'static str {
        match self {
            Self::MalformedInput => "MALFORMED_INPUT",
            Self::InvalidSignature => "INVALID_SIGNATURE",
            Self::Expired => "EXPIRED",
            Self::InvalidToken => "INVALID_TOKEN",
            Self::UserBanned => "USER_BANNED",
            Self::ExpertContextRequired => "EXPERT_CONTEXT_REQUIRED",
            Self::ExpertMembershipRequired => "EXPERT_MEMBERSHIP_REQUIRED",
            Self::ForbiddenExpertRole => "FORBIDDEN_EXPERT_ROLE",
            Self::ForbiddenPlatformRole => "FORBIDDEN_PLATFORM_ROLE",
            Self::NotFound => "NOT_FOUND",
            Self::Internal => "INTERNAL",
        }
    }

    /// The HTTP status the kind maps to.
    #[must_use]
    pub const fn status(self) -> StatusCode {
        match self {
            Self::MalformedInput | Self::ExpertContextRequired => StatusCode::BAD_REQUEST,
            Self::InvalidSignature | Self::Expired | Self::InvalidToken => {
                StatusCode::UNAUTHORIZED
            }
            Self::UserBanned
            | Self::ExpertMembershipRequired
            | Self::ForbiddenExpertRole
            | Self::ForbiddenPlatformRole => StatusCode::FORBIDDEN,
            Self::NotFound => StatusCode::NOT_FOUND,
            Self::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    const fn default_message(self) -> &'static str {
        match self {
            Self::MalformedInput => "Malformed input",
            Self::InvalidSignature => "Invalid signature",
            Self::Expired => "Credentials expired",
            Self::InvalidToken => "Invalid token",
            Self::UserBanned => "Account is banned",
            Self::ExpertContextRequired => "Expert context required",
            Self::ExpertMembershipRequired => "Expert membership required",
            Self::ForbiddenExpertRole => "Insufficient expert role",
            Self::ForbiddenPlatformRole => "Insufficient platform role",
            Self::NotFound => "Not found",
            Self::Internal => "Internal server error",
        }
    }
}

/// An API error ready to be rendered as a response.
#[derive(Debug, Clone)]
pub struct ApiError {
    kind: ApiErrorKind,
    message: String,
    trace_id: Option<String>,
}

impl ApiError {
    /// Creates an error of the given kind with its default message.
    #[must_use]
    pub fn new(kind: ApiErrorKind) -> Self {
        Self {
            kind,
            message: kind.default_message().to_string(),
            trace_id: None,
        }
    }

    /// Creates a `MALFORMED_INPUT` error with a specific message.
    #[must_use]
    pub fn malformed(message: impl Into<String>) -> Self {
        Self::new(ApiErrorKind::MalformedInput).with_message(message)
    }

    /// Creates a `NOT_FOUND` error with a specific message.
    #[must_use]
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(ApiErrorKind::NotFound).with_message(message)
    }

    /// Creates an `INTERNAL` error. The cause belongs in the log, not here.
    #[must_use]
    pub fn internal() -> Self {
        Self::new(ApiErrorKind::Internal)
    }

    /// Replaces the user-visible message.
    #[must_use]
    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = message.into();
        self
    }

    /// Attaches the request's trace id for support correlation.
    #[must_use]
    pub fn with_trace(mut self, trace: &TraceId) -> Self {
        self.trace_id = Some(trace.as_str().to_string());
        self
    }

    /// Returns the error kind.
    #[must_use]
    pub fn kind(&self) -> ApiErrorKind {
        self.kind
    }
}

impl std::fmt::Display for ApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.kind.code(), self.message)
    }
}

impl std::error::Error for ApiError {}

impl From<InitDataError> for ApiError {
    fn from(err: InitDataError) -> Self {
        match err {
            InitDataError::Malformed { reason } => Self::malformed(reason),
            InitDataError::InvalidSignature => Self::new(ApiErrorKind::InvalidSignature),
            InitDataError::Expired => Self::new(ApiErrorKind::Expired),
        }
    }
}

impl From<TokenError> for ApiError {
    fn from(err: TokenError) -> Self {
        match err {
            TokenError::Invalid => Self::new(ApiErrorKind::InvalidToken),
            TokenError::Signing { .. } => Self::internal(),
        }
    }
}

/// Wire shape of an error response.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ErrorBody {
    error: &'static str,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    trace_id: Option<String>,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            error: self.kind.code(),
            message: self.message,
            trace_id: self.trace_id,
        };
        (self.kind.status(), Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_mapping_matches_taxonomy() {
        assert_eq!(
            ApiErrorKind::MalformedInput.status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            ApiErrorKind::ExpertContextRequired.status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            ApiErrorKind::InvalidSignature.status(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(ApiErrorKind::Expired.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(
            ApiErrorKind::InvalidToken.status(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(ApiErrorKind::UserBanned.status(), StatusCode::FORBIDDEN);
        assert_eq!(
            ApiErrorKind::ExpertMembershipRequired.status(),
            StatusCode::FORBIDDEN
        );
        assert_eq!(
            ApiErrorKind::ForbiddenExpertRole.status(),
            StatusCode::FORBIDDEN
        );
        assert_eq!(
            ApiErrorKind::ForbiddenPlatformRole.status(),
            StatusCode::FORBIDDEN
        );
        assert_eq!(ApiErrorKind::NotFound.status(), StatusCode::NOT_FOUND);
        assert_eq!(
            ApiErrorKind::Internal.status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn init_data_errors_normalize() {
        let err: ApiError = InitDataError::Malformed {
            reason: "missing hash".to_string(),
        }
        .into();
        assert_eq!(err.kind(), ApiErrorKind::MalformedInput);

        let err: ApiError = InitDataError::InvalidSignature.into();
        assert_eq!(err.kind(), ApiErrorKind::InvalidSignature);

        let err: ApiError = InitDataError::Expired.into();
        assert_eq!(err.kind(), ApiErrorKind::Expired);
    }

    #[test]
    fn token_errors_normalize() {
        let err: ApiError = TokenError::Invalid.into();
        assert_eq!(err.kind(), ApiErrorKind::InvalidToken);

        // A signing fault is ours, not the caller's.
        let err: ApiError = TokenError::Signing {
            reason: "boom".to_string(),
        }
        .into();
        assert_eq!(err.kind(), ApiErrorKind::Internal);
    }

    #[tokio::test]
    async fn response_body_carries_code_and_trace() {
        let trace = TraceId::new("trace-123".to_string());
        let response = ApiError::new(ApiErrorKind::ForbiddenPlatformRole)
            .with_trace(&trace)
            .into_response();

        assert_eq!(response.status(), StatusCode::FORBIDDEN);

        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("body");
        let body: serde_json::Value = serde_json::from_slice(&bytes).expect("json");
        assert_eq!(body["error"], "FORBIDDEN_PLATFORM_ROLE");
        assert_eq!(body["traceId"], "trace-123");
        assert!(body["message"].is_string());
    }

    #[test]
    fn internal_error_message_is_generic() {
        let err = ApiError::internal();
        assert_eq!(err.to_string(), "INTERNAL: Internal server error");
    }
}
