//! Stateless session tokens.
//!
//! A successful Telegram login mints a compact, HMAC-signed token carrying
//! the subject user id and the Telegram identity it was derived from. There
//! is no server-side session store and no revocation list; the short TTL
//! bounds how long a token stays usable, and re-authentication through the
//! `initData` path is the only renewal route.

use chrono::{Duration, Utc};
use coursegram_core::UserId;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

use crate::error::TokenError;

/// Claims embedded in every issued session token.
#[derive(Debug, Serialize, Deserialize)]
struct AccessTokenClaims {
    /// Subject: the internal user id.
    sub: String,
    /// Telegram numeric id the session was authenticated from.
    tgid: i64,
    /// Issued-at (Unix timestamp, seconds).
    iat: i64,
    /// Expiry (Unix timestamp, seconds).
    exp: i64,
}

/// The identity proven by a validated session token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TokenIdentity {
    /// Internal user id the token was issued for.
    pub user_id: UserId,
    /// Telegram numeric id the session was authenticated from.
    pub telegram_id: i64,
}

/// Issues and validates signed session tokens.
///
/// The signing algorithm is pinned: tokens presenting any other algorithm
/// in their header are rejected outright, and expiry is checked with zero
/// leeway.
pub struct TokenService {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    ttl: Duration,
    validation: Validation,
}

impl TokenService {
    /// Algorithm every token is signed and validated with.
    const ALGORITHM: Algorithm = Algorithm::HS256;

    /// Creates a token service with the given signing secret and TTL.
    #[must_use]
    pub fn new(secret: &str, ttl: Duration) -> Self {
        let mut validation = Validation::new(Self::ALGORITHM);
        validation.leeway = 0;

        Self {
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            ttl,
            validation,
        }
    }

    /// Returns the configured token lifetime.
    #[must_use]
    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Issues a token for the given subject.
    ///
    /// # Errors
    ///
    /// Returns [`TokenError::Signing`] if the claims cannot be signed; this
    /// is a server-side fault, not a property of the subject.
    pub fn issue(&self, user_id: UserId, telegram_id: i64) -> Result<String, TokenError> {
        let now = Utc::now();
        let claims = AccessTokenClaims {
            sub: user_id.to_string(),
            tgid: telegram_id,
            iat: now.timestamp(),
            exp: (now + self.ttl).timestamp(),
        };

        jsonwebtoken::encode(&Header::new(Self::ALGORITHM), &claims, &self.encoding_key).map_err(
            |e| TokenError::Signing {
                reason: e.to_string(),
            },
        )
    }

    /// Validates a token and returns the identity it proves.
    ///
    /// # Errors
    ///
    /// Every failure mode — bad signature, wrong algorithm, expired,
    /// malformed structure, empty input, unparseable subject — collapses to
    /// [`TokenError::Invalid`].
    pub fn validate(&self, token: &str) -> Result<TokenIdentity, TokenError> {
        let data = jsonwebtoken::decode::<AccessTokenClaims>(
            token,
            &self.decoding_key,
            &self.validation,
        )
        .map_err(|_| TokenError::Invalid)?;

        let user_id = UserId::from_str(&data.claims.sub).map_err(|_| TokenError::Invalid)?;

        Ok(TokenIdentity {
            user_id,
            telegram_id: data.claims.tgid,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &str = "test-signing-secret";

    fn service() -> TokenService {
        TokenService::new(SECRET, Duration::minutes(30))
    }

    #[test]
    fn issue_validate_roundtrip() {
        let service = service();
        let user_id = UserId::new();

        let token = service.issue(user_id, 42).expect("issue");
        let identity = service.validate(&token).expect("validate");

        assert_eq!(identity.user_id, user_id);
        assert_eq!(identity.telegram_id, 42);
    }

    #[test]
    fn expired_token_is_invalid() {
        let service = TokenService::new(SECRET, Duration::seconds(-10));
        let token = service.issue(UserId::new(), 1).expect("issue");

        assert_eq!(service.validate(&token), Err(TokenError::Invalid));
    }

    #[test]
    fn token_signed_with_other_secret_is_invalid() {
        let other = TokenService::new("different-secret", Duration::minutes(30));
        let token = other.issue(UserId::new(), 1).expect("issue");

        assert_eq!(service().validate(&token), Err(TokenError::Invalid));
    }

    #[test]
    fn alternate_algorithm_is_rejected() {
        // Same secret, different algorithm in the header.
        let claims = AccessTokenClaims {
            sub: UserId::new().to_string(),
            tgid: 1,
            iat: Utc::now().timestamp(),
            exp: (Utc::now() + Duration::minutes(30)).timestamp(),
        };
        let token = jsonwebtoken::encode(
            &Header::new(Algorithm::HS384),
            &claims,
            &EncodingKey::from_secret(SECRET.as_bytes()),
        )
        .expect("encode");

        assert_eq!(service().validate(&token), Err(TokenError::Invalid));
    }

    #[test]
    fn tampered_token_is_invalid() {
        let service = service();
        let mut token = service.issue(UserId::new(), 1).expect("issue");
        // Flip a character in the payload segment.
        let flipped = if token.as_bytes()[token.len() / 2] == b'a' {
            'b'
        } else {
            'a'
        };
        let mid = token.len() / 2;
        token.replace_range(mid..=mid, &flipped.to_string());

        assert_eq!(service.validate(&token), Err(TokenError::Invalid));
    }

    #[test]
    fn garbage_and_empty_input_are_invalid() {
        let service = service();
        assert_eq!(service.validate(""), Err(TokenError::Invalid));
        assert_eq!(service.validate("not.a.token"), Err(TokenError::Invalid));
        assert_eq!(service.validate("a.b"), Err(TokenError::Invalid));
    }
}
