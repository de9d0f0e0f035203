//! Platform-wide role hierarchy.
//!
//! Every user account carries exactly one platform role. Roles form a total
//! order; a role satisfies a requirement when its rank is at least the
//! required rank. This hierarchy is independent from expert-scoped member
//! roles (see the `coursegram-authz` crate) — the two never compose.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Error returned when parsing a role from a string fails.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseRoleError {
    /// The value that failed to parse.
    pub value: String,
}

impl fmt::Display for ParseRoleError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown platform role: {}", self.value)
    }
}

impl std::error::Error for ParseRoleError {}

/// Platform-wide role attached to a user account.
///
/// Ordered lowest to highest: `User < Moderator < Admin < Owner`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlatformRole {
    /// Standard account; no elevated capabilities.
    User,
    /// Content and community moderation capabilities.
    Moderator,
    /// Platform administration (user management, audit access).
    Admin,
    /// Full control, including administration of other admins.
    Owner,
}

impl PlatformRole {
    /// Returns the role's rank within the hierarchy.
    #[must_use]
    pub const fn rank(self) -> i8 {
        match self {
            Self::User => 0,
            Self::Moderator => 1,
            Self::Admin => 2,
            Self::Owner => 3,
        }
    }

    /// Returns true if this role satisfies the given requirement.
    #[must_use]
    pub const fn allows(self, required: Self) -> bool {
        self.rank() >= required.rank()
    }

    /// Returns the wire/storage name of the role.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Moderator => "moderator",
            Self::Admin => "admin",
            Self::Owner => "owner",
        }
    }
}

impl fmt::Display for PlatformRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for PlatformRole {
    type Err = ParseRoleError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "user" => Ok(Self::User),
            "moderator" => Ok(Self::Moderator),
            "admin" => Ok(Self::Admin),
            "owner" => Ok(Self::Owner),
            other => Err(ParseRoleError {
                value: other.to_string(),
            }),
        }
    }
}
