//! Error types for the platform-access crate.
//!
//! Both enums are closed taxonomies: callers match exhaustively and map the
//! variants onto HTTP statuses at the boundary. No underlying crypto or
//! parser error ever escapes through them.

use std::fmt;

/// Errors from Telegram `initData` verification.
///
/// `Malformed` is a client error (the blob is structurally broken);
/// `InvalidSignature` and `Expired` are authentication failures.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InitDataError {
    /// The payload is structurally invalid (missing hash, bad `auth_date`,
    /// absent or unparseable `user` field).
    Malformed { reason: String },
    /// The HMAC signature does not match the canonical check-string.
    InvalidSignature,
    /// The payload's `auth_date` is outside the accepted window.
    Expired,
}

impl fmt::Display for InitDataError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Malformed { reason } => {
                write!(f, "malformed init data: {reason}")
            }
            Self::InvalidSignature => {
                write!(f, "init data signature is invalid")
            }
            Self::Expired => {
                write!(f, "init data has expired")
            }
        }
    }
}

impl std::error::Error for InitDataError {}

/// Errors from session token operations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TokenError {
    /// The token failed validation. All failure modes (bad signature, wrong
    /// algorithm, expired, malformed structure, empty input) collapse here.
    Invalid,
    /// Signing a new token failed. This is a server-side fault, not a
    /// property of the caller's credential.
    Signing { reason: String },
}

impl fmt::Display for TokenError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Invalid => {
                write!(f, "invalid token")
            }
            Self::Signing { reason } => {
                write!(f, "failed to sign token: {reason}")
            }
        }
    }
}

impl std::error::Error for TokenError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn malformed_display_carries_reason() {
        let err = InitDataError::Malformed {
            reason: "missing hash".to_string(),
        };
        assert!(err.to_string().contains("malformed"));
        assert!(err.to_string().contains("missing hash"));
    }

    #[test]
    fn invalid_signature_display() {
        let err = InitDataError::InvalidSignature;
        assert!(err.to_string().contains("signature"));
    }

    #[test]
    fn expired_display() {
        let err = InitDataError::Expired;
        assert!(err.to_string().contains("expired"));
    }

    #[test]
    fn token_invalid_does_not_leak_details() {
        let err = TokenError::Invalid;
        assert_eq!(err.to_string(), "invalid token");
    }
}
