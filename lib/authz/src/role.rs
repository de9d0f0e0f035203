//! Expert-scoped roles and the shared rank comparison.
//!
//! The platform carries two independent role hierarchies: the platform-wide
//! one (`coursegram_platform_access::PlatformRole`) and the expert-scoped
//! one defined here. Each is a total order over a small closed enum, and
//! both answer requirement checks through the same rule:
//! `rank(actual) >= rank(required)`. The hierarchies never compose.

use coursegram_platform_access::PlatformRole;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Error returned when parsing an expert role from a string fails.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseExpertRoleError {
    /// The value that failed to parse.
    pub value: String,
}

impl fmt::Display for ParseExpertRoleError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown expert role: {}", self.value)
    }
}

impl std::error::Error for ParseExpertRoleError {}

/// A user's role within one expert (tenant) scope.
///
/// Ordered lowest to highest: `Support < Reviewer < Manager < Owner`.
/// Independent from the platform-wide role: a platform admin holds no
/// expert role unless explicitly made a member.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExpertRole {
    /// Answers learner questions; read-mostly access.
    Support,
    /// Reviews submissions and course material.
    Reviewer,
    /// Manages the expert's catalog and staff below owner level.
    Manager,
    /// Full control over the expert scope, including membership.
    Owner,
}

impl ExpertRole {
    /// Returns the role's rank within the hierarchy.
    #[must_use]
    pub const fn rank(self) -> i8 {
        match self {
            Self::Support => 0,
            Self::Reviewer => 1,
            Self::Manager => 2,
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
            Self::Support => "support",
            Self::Reviewer => "reviewer",
            Self::Manager => "manager",
            Self::Owner => "owner",
        }
    }
}

impl fmt::Display for ExpertRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for ExpertRole {
    type Err = ParseExpertRoleError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "support" => Ok(Self::Support),
            "reviewer" => Ok(Self::Reviewer),
            "manager" => Ok(Self::Manager),
            "owner" => Ok(Self::Owner),
            other => Err(ParseExpertRoleError {
                value: other.to_string(),
            }),
        }
    }
}

/// A role that occupies a rank in an ordered hierarchy.
pub trait RoleRank {
    /// The role's rank; higher ranks satisfy lower requirements.
    fn rank(&self) -> i8;
}

impl RoleRank for ExpertRole {
    fn rank(&self) -> i8 {
        Self::rank(*self)
    }
}

impl RoleRank for PlatformRole {
    fn rank(&self) -> i8 {
        Self::rank(*self)
    }
}

/// The single comparison rule both hierarchies share.
///
/// An absent actual role ranks `-1` and an absent requirement ranks `0`, so
/// unknown or missing roles always fail closed rather than defaulting open.
#[must_use]
pub fn is_allowed<R: RoleRank>(actual: Option<R>, required: Option<R>) -> bool {
    let actual_rank = actual.as_ref().map_or(-1, RoleRank::rank);
    let required_rank = required.as_ref().map_or(0, RoleRank::rank);
    actual_rank >= required_rank
}
