//! User domain type.
//!
//! A `User` represents an account on the learning platform. Accounts are
//! identified by their Telegram numeric id and carry an internal `UserId`
//! used for all platform operations and authorization checks.

use chrono::{DateTime, Utc};
use coursegram_core::UserId;
use serde::{Deserialize, Serialize};

use crate::role::PlatformRole;

/// Represents a platform user.
///
/// Users are created on first successful Telegram login. The internal `id`
/// is the subject of issued session tokens; the Telegram id ties the account
/// to the external identity. A non-null `banned_at` permanently blocks
/// authenticated access regardless of the role the account holds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    /// Internal platform user ID.
    id: UserId,
    /// Telegram numeric user id (the external identity).
    telegram_id: i64,
    /// Telegram username, if the account has one.
    username: Option<String>,
    /// First name from the Telegram profile.
    first_name: Option<String>,
    /// Last name from the Telegram profile.
    last_name: Option<String>,
    /// Avatar URL from the Telegram profile.
    avatar_url: Option<String>,
    /// Platform-wide role.
    platform_role: PlatformRole,
    /// When the account was banned. Non-null blocks all authenticated access.
    banned_at: Option<DateTime<Utc>>,
    /// Operator-supplied ban reason.
    banned_reason: Option<String>,
    /// When the user record was created.
    created_at: DateTime<Utc>,
    /// When the user record was last updated.
    updated_at: DateTime<Utc>,
}

impl User {
    /// Creates a new user for the given Telegram identity.
    ///
    /// The internal ID is generated automatically and the account starts at
    /// the lowest platform role. Use this on first login.
    #[must_use]
    pub fn new(telegram_id: i64) -> Self {
        let now = Utc::now();
        Self {
            id: UserId::new(),
            telegram_id,
            username: None,
            first_name: None,
            last_name: None,
            avatar_url: None,
            platform_role: PlatformRole::User,
            banned_at: None,
            banned_reason: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Creates a user with all fields specified.
    ///
    /// Use this when reconstituting a user from storage.
    #[must_use]
    #[expect(clippy::too_many_arguments)]
    pub fn with_all_fields(
        id: UserId,
        telegram_id: i64,
        username: Option<String>,
        first_name: Option<String>,
        last_name: Option<String>,
        avatar_url: Option<String>,
        platform_role: PlatformRole,
        banned_at: Option<DateTime<Utc>>,
        banned_reason: Option<String>,
        created_at: DateTime<Utc>,
        updated_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            telegram_id,
            username,
            first_name,
            last_name,
            avatar_url,
            platform_role,
            banned_at,
            banned_reason,
            created_at,
            updated_at,
        }
    }

    /// Returns the user's internal platform ID.
    #[must_use]
    pub fn id(&self) -> UserId {
        self.id
    }

    /// Returns the Telegram numeric user id.
    #[must_use]
    pub fn telegram_id(&self) -> i64 {
        self.telegram_id
    }

    /// Returns the Telegram username, if set.
    #[must_use]
    pub fn username(&self) -> Option<&str> {
        self.username.as_deref()
    }

    /// Returns the first name, if set.
    #[must_use]
    pub fn first_name(&self) -> Option<&str> {
        self.first_name.as_deref()
    }

    /// Returns the last name, if set.
    #[must_use]
    pub fn last_name(&self) -> Option<&str> {
        self.last_name.as_deref()
    }

    /// Returns the avatar URL, if set.
    #[must_use]
    pub fn avatar_url(&self) -> Option<&str> {
        self.avatar_url.as_deref()
    }

    /// Returns the user's platform role.
    #[must_use]
    pub fn platform_role(&self) -> PlatformRole {
        self.platform_role
    }

    /// Returns when the account was banned, if it is.
    #[must_use]
    pub fn banned_at(&self) -> Option<DateTime<Utc>> {
        self.banned_at
    }

    /// Returns the ban reason, if any.
    #[must_use]
    pub fn banned_reason(&self) -> Option<&str> {
        self.banned_reason.as_deref()
    }

    /// Returns true if the account is banned.
    #[must_use]
    pub fn is_banned(&self) -> bool {
        self.banned_at.is_some()
    }

    /// Returns when the user was created.
    #[must_use]
    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Returns when the user was last updated.
    #[must_use]
    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    /// Refreshes the Telegram profile fields.
    ///
    /// Called on every login so the stored profile tracks Telegram.
    pub fn update_profile(
        &mut self,
        username: Option<String>,
        first_name: Option<String>,
        last_name: Option<String>,
        avatar_url: Option<String>,
    ) {
        self.username = username;
        self.first_name = first_name;
        self.last_name = last_name;
        self.avatar_url = avatar_url;
        self.updated_at = Utc::now();
    }

    /// Sets the user's platform role.
    pub fn set_platform_role(&mut self, role: PlatformRole) {
        self.platform_role = role;
        self.updated_at = Utc::now();
    }

    /// Bans the account.
    ///
    /// Banned accounts fail authentication before any role check runs.
    pub fn ban(&mut self, reason: Option<String>) {
        let now = Utc::now();
        self.banned_at = Some(now);
        self.banned_reason = reason;
        self.updated_at = now;
    }

    /// Lifts a ban.
    pub fn unban(&mut self) {
        self.banned_at = None;
        self.banned_reason = None;
        self.updated_at = Utc::now();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_user_has_generated_id() {
        let user = User::new(42);
        let id_str = user.id().to_string();
        assert!(id_str.starts_with("usr_"));
    }

    #[test]
    fn new_user_defaults() {
        let user = User::new(123_456);

        assert_eq!(user.telegram_id(), 123_456);
        assert_eq!(user.platform_role(), PlatformRole::User);
        assert!(user.username().is_none());
        assert!(!user.is_banned());
        assert_eq!(user.created_at(), user.updated_at());
    }

    #[test]
    fn update_profile_bumps_timestamp() {
        let mut user = User::new(1);
        let original_updated_at = user.updated_at();

        std::thread::sleep(std::time::Duration::from_millis(1));

        user.update_profile(
            Some("alice".to_string()),
            Some("Alice".to_string()),
            Some("Smith".to_string()),
            None,
        );

        assert_eq!(user.username(), Some("alice"));
        assert_eq!(user.first_name(), Some("Alice"));
        assert_eq!(user.last_name(), Some("Smith"));
        assert!(user.avatar_url().is_none());
        assert!(user.updated_at() > original_updated_at);
    }

    #[test]
    fn set_platform_role() {
        let mut user = User::new(1);
        user.set_platform_role(PlatformRole::Admin);
        assert_eq!(user.platform_role(), PlatformRole::Admin);
    }

    #[test]
    fn ban_and_unban() {
        let mut user = User::new(1);

        user.ban(Some("spam".to_string()));
        assert!(user.is_banned());
        assert_eq!(user.banned_reason(), Some("spam"));

        user.unban();
        assert!(!user.is_banned());
        assert!(user.banned_reason().is_none());
    }

    #[test]
    fn ban_without_reason() {
        let mut user = User::new(1);
        user.ban(None);
        assert!(user.is_banned());
        assert!(user.banned_reason().is_none());
    }

    #[test]
    fn with_all_fields_preserves_values() {
        let id = UserId::new();
        let created = Utc::now() - chrono::Duration::days(30);
        let updated = Utc::now() - chrono::Duration::days(1);

        let user = User::with_all_fields(
            id,
            987,
            Some("bob".to_string()),
            Some("Bob".to_string()),
            None,
            Some("https://t.me/i/userpic/bob.jpg".to_string()),
            PlatformRole::Moderator,
            None,
            None,
            created,
            updated,
        );

        assert_eq!(user.id(), id);
        assert_eq!(user.telegram_id(), 987);
        assert_eq!(user.username(), Some("bob"));
        assert_eq!(user.platform_role(), PlatformRole::Moderator);
        assert_eq!(user.created_at(), created);
        assert_eq!(user.updated_at(), updated);
    }

    #[test]
    fn user_serialization_roundtrip() {
        let mut user = User::new(55);
        user.update_profile(Some("carol".to_string()), None, None, None);

        let json = serde_json::to_string(&user).expect("serialize");
        let parsed: User = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(user, parsed);
    }
}
