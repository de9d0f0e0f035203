//! Telegram Mini-App `initData` verification.
//!
//! Mini-App clients receive a signed, URL-encoded parameter blob from
//! Telegram and forward it verbatim on login. Verification recomputes the
//! HMAC-SHA256 over the canonical check-string and compares it in constant
//! time against the `hash` field, exactly as the Telegram Web-App
//! specification prescribes. This is a pure function: same inputs, same
//! outcome, no retries.

use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use serde::Deserialize;
use sha2::Sha256;
use subtle::ConstantTimeEq;

use crate::error::InitDataError;

type HmacSha256 = Hmac<Sha256>;

/// Fixed key for deriving the per-bot secret, per the Telegram spec.
const SECRET_DERIVATION_KEY: &[u8] = b"WebAppData";

/// The identity extracted from a successfully verified `initData` blob.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerifiedInitData {
    /// Telegram numeric user id.
    pub telegram_id: i64,
    /// Telegram username, if the account has one.
    pub username: Option<String>,
    /// First name from the Telegram profile.
    pub first_name: Option<String>,
    /// Last name from the Telegram profile.
    pub last_name: Option<String>,
    /// Avatar URL, if Telegram supplied one.
    pub photo_url: Option<String>,
    /// When Telegram issued the blob.
    pub auth_date: DateTime<Utc>,
}

/// Shape of the `user` field inside `initData`.
#[derive(Debug, Deserialize)]
struct InitDataUser {
    id: i64,
    #[serde(default)]
    username: Option<String>,
    #[serde(default)]
    first_name: Option<String>,
    #[serde(default)]
    last_name: Option<String>,
    #[serde(default)]
    photo_url: Option<String>,
}

/// Verifies a raw `initData` blob against the bot token.
///
/// `max_age_seconds` bounds how old the blob's `auth_date` may be; blobs
/// dated in the future are rejected as well.
///
/// # Errors
///
/// Returns [`InitDataError::Malformed`] for structural problems,
/// [`InitDataError::Expired`] when `auth_date` falls outside the window,
/// and [`InitDataError::InvalidSignature`] when the recomputed HMAC does
/// not match the provided `hash`.
pub fn verify_init_data(
    raw: &str,
    bot_token: &str,
    max_age_seconds: i64,
) -> Result<VerifiedInitData, InitDataError> {
    let raw = raw.strip_prefix('?').unwrap_or(raw);

    let mut pairs: Vec<(String, String)> = form_urlencoded::parse(raw.as_bytes())
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect();

    // The hash never participates in its own check-string.
    let hash_idx = pairs
        .iter()
        .position(|(k, _)| k == "hash")
        .ok_or_else(|| InitDataError::Malformed {
            reason: "missing hash".to_string(),
        })?;
    let (_, provided_hash) = pairs.remove(hash_idx);

    let auth_date_raw = pairs
        .iter()
        .find(|(k, _)| k == "auth_date")
        .map(|(_, v)| v.as_str())
        .ok_or_else(|| InitDataError::Malformed {
            reason: "missing auth_date".to_string(),
        })?;
    let auth_date_secs: i64 = auth_date_raw
        .parse()
        .map_err(|_| InitDataError::Malformed {
            reason: "auth_date is not numeric".to_string(),
        })?;

    let age = Utc::now().timestamp() - auth_date_secs;
    if age < 0 || age > max_age_seconds {
        return Err(InitDataError::Expired);
    }

    let user_raw = pairs
        .iter()
        .find(|(k, _)| k == "user")
        .map(|(_, v)| v.as_str())
        .ok_or_else(|| InitDataError::Malformed {
            reason: "missing user".to_string(),
        })?;
    let user: InitDataUser =
        serde_json::from_str(user_raw).map_err(|_| InitDataError::Malformed {
            reason: "user field is not a valid user object".to_string(),
        })?;

    // Canonical check-string: remaining pairs as decoded `key=value` lines,
    // sorted lexicographically, joined by newlines.
    let mut lines: Vec<String> = pairs.iter().map(|(k, v)| format!("{k}={v}")).collect();
    lines.sort();
    let check_string = lines.join("\n");

    let secret = hmac_sha256(SECRET_DERIVATION_KEY, bot_token.as_bytes());
    let expected_hash = hex::encode(hmac_sha256(&secret, check_string.as_bytes()));

    let provided = provided_hash.as_bytes();
    let expected = expected_hash.as_bytes();
    if provided.len() != expected.len() || !bool::from(provided.ct_eq(expected)) {
        return Err(InitDataError::InvalidSignature);
    }

    let auth_date =
        DateTime::from_timestamp(auth_date_secs, 0).ok_or_else(|| InitDataError::Malformed {
            reason: "auth_date out of range".to_string(),
        })?;

    Ok(VerifiedInitData {
        telegram_id: user.id,
        username: user.username,
        first_name: user.first_name,
        last_name: user.last_name,
        photo_url: user.photo_url,
        auth_date,
    })
}

fn hmac_sha256(key: &[u8], message: &[u8]) -> Vec<u8> {
    let mut mac = HmacSha256::new_from_slice(key).expect("HMAC accepts keys of any length");
    mac.update(message);
    mac.finalize().into_bytes().to_vec()
}

#[cfg(test)]
mod tests {
    use super::*;

    const BOT_TOKEN: &str = "123456:TEST-bot-token";
    const MAX_AGE: i64 = 600;

    /// Computes the hash Telegram would attach to the given decoded pairs.
    fn compute_hash(pairs: &[(&str, String)]) -> String {
        let mut lines: Vec<String> = pairs.iter().map(|(k, v)| format!("{k}={v}")).collect();
        lines.sort();
        let check_string = lines.join("\n");
        let secret = hmac_sha256(SECRET_DERIVATION_KEY, BOT_TOKEN.as_bytes());
        hex::encode(hmac_sha256(&secret, check_string.as_bytes()))
    }

    /// URL-encodes pairs into an initData blob.
    fn encode(pairs: &[(&str, String)]) -> String {
        let mut serializer = form_urlencoded::Serializer::new(String::new());
        for (k, v) in pairs {
            serializer.append_pair(k, v);
        }
        serializer.finish()
    }

    /// A well-formed signed blob with the given auth_date.
    fn signed_init_data(auth_date: i64) -> String {
        let mut pairs = base_pairs(auth_date);
        let hash = compute_hash(&pairs);
        pairs.push(("hash", hash));
        encode(&pairs)
    }

    fn base_pairs(auth_date: i64) -> Vec<(&'static str, String)> {
        vec![
            ("query_id", "AAHdF6IQAAAAAN0XohDhrOrc".to_string()),
            (
                "user",
                r#"{"id":99,"first_name":"Alice","username":"alice"}"#.to_string(),
            ),
            ("auth_date", auth_date.to_string()),
        ]
    }

    #[test]
    fn valid_init_data_verifies() {
        let raw = signed_init_data(Utc::now().timestamp());

        let verified = verify_init_data(&raw, BOT_TOKEN, MAX_AGE).expect("should verify");
        assert_eq!(verified.telegram_id, 99);
        assert_eq!(verified.username.as_deref(), Some("alice"));
        assert_eq!(verified.first_name.as_deref(), Some("Alice"));
        assert!(verified.last_name.is_none());
    }

    #[test]
    fn leading_question_mark_is_stripped() {
        let raw = format!("?{}", signed_init_data(Utc::now().timestamp()));
        assert!(verify_init_data(&raw, BOT_TOKEN, MAX_AGE).is_ok());
    }

    #[test]
    fn extra_fields_participate_in_check_string() {
        let now = Utc::now().timestamp();
        let mut pairs = base_pairs(now);
        pairs.push(("chat_instance", "-3788475317572404878".to_string()));
        let hash = compute_hash(&pairs);
        pairs.push(("hash", hash));

        assert!(verify_init_data(&encode(&pairs), BOT_TOKEN, MAX_AGE).is_ok());
    }

    #[test]
    fn tampered_value_fails_signature() {
        let now = Utc::now().timestamp();
        let mut pairs = base_pairs(now);
        let hash = compute_hash(&pairs);
        // Alter one signed byte after signing: shift auth_date by a second
        // (still inside the freshness window, so only the signature trips).
        pairs[2].1 = (now - 1).to_string();
        pairs.push(("hash", hash));

        assert_eq!(
            verify_init_data(&encode(&pairs), BOT_TOKEN, MAX_AGE),
            Err(InitDataError::InvalidSignature)
        );
    }

    #[test]
    fn wrong_bot_token_fails_signature() {
        let raw = signed_init_data(Utc::now().timestamp());
        assert_eq!(
            verify_init_data(&raw, "123456:OTHER-token", MAX_AGE),
            Err(InitDataError::InvalidSignature)
        );
    }

    #[test]
    fn truncated_hash_fails_signature() {
        let now = Utc::now().timestamp();
        let mut pairs = base_pairs(now);
        let mut hash = compute_hash(&pairs);
        hash.truncate(16);
        pairs.push(("hash", hash));

        assert_eq!(
            verify_init_data(&encode(&pairs), BOT_TOKEN, MAX_AGE),
            Err(InitDataError::InvalidSignature)
        );
    }

    #[test]
    fn missing_hash_is_malformed() {
        let raw = encode(&base_pairs(Utc::now().timestamp()));
        assert!(matches!(
            verify_init_data(&raw, BOT_TOKEN, MAX_AGE),
            Err(InitDataError::Malformed { .. })
        ));
    }

    #[test]
    fn missing_auth_date_is_malformed() {
        let mut pairs = base_pairs(Utc::now().timestamp());
        pairs.remove(2);
        let hash = compute_hash(&pairs);
        pairs.push(("hash", hash));

        assert!(matches!(
            verify_init_data(&encode(&pairs), BOT_TOKEN, MAX_AGE),
            Err(InitDataError::Malformed { .. })
        ));
    }

    #[test]
    fn non_numeric_auth_date_is_malformed() {
        let mut pairs = base_pairs(Utc::now().timestamp());
        pairs[2].1 = "yesterday".to_string();
        let hash = compute_hash(&pairs);
        pairs.push(("hash", hash));

        assert!(matches!(
            verify_init_data(&encode(&pairs), BOT_TOKEN, MAX_AGE),
            Err(InitDataError::Malformed { .. })
        ));
    }

    #[test]
    fn stale_auth_date_is_expired() {
        let raw = signed_init_data(Utc::now().timestamp() - MAX_AGE - 60);
        assert_eq!(
            verify_init_data(&raw, BOT_TOKEN, MAX_AGE),
            Err(InitDataError::Expired)
        );
    }

    #[test]
    fn future_auth_date_is_expired() {
        let raw = signed_init_data(Utc::now().timestamp() + 120);
        assert_eq!(
            verify_init_data(&raw, BOT_TOKEN, MAX_AGE),
            Err(InitDataError::Expired)
        );
    }

    #[test]
    fn missing_user_is_malformed() {
        let now = Utc::now().timestamp();
        let mut pairs = base_pairs(now);
        pairs.remove(1);
        let hash = compute_hash(&pairs);
        pairs.push(("hash", hash));

        assert!(matches!(
            verify_init_data(&encode(&pairs), BOT_TOKEN, MAX_AGE),
            Err(InitDataError::Malformed { .. })
        ));
    }

    #[test]
    fn non_json_user_is_malformed() {
        let now = Utc::now().timestamp();
        let mut pairs = base_pairs(now);
        pairs[1].1 = "not-json".to_string();
        let hash = compute_hash(&pairs);
        pairs.push(("hash", hash));

        assert!(matches!(
            verify_init_data(&encode(&pairs), BOT_TOKEN, MAX_AGE),
            Err(InitDataError::Malformed { .. })
        ));
    }

    #[test]
    fn user_without_numeric_id_is_malformed() {
        let now = Utc::now().timestamp();
        let mut pairs = base_pairs(now);
        pairs[1].1 = r#"{"first_name":"Alice"}"#.to_string();
        let hash = compute_hash(&pairs);
        pairs.push(("hash", hash));

        assert!(matches!(
            verify_init_data(&encode(&pairs), BOT_TOKEN, MAX_AGE),
            Err(InitDataError::Malformed { .. })
        ));
    }

    #[test]
    fn empty_input_is_malformed() {
        assert!(matches!(
            verify_init_data("", BOT_TOKEN, MAX_AGE),
            Err(InitDataError::Malformed { .. })
        ));
    }
}
