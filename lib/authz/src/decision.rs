//! Pure expert-access decisions.
//!
//! The request-time guard resolves the caller's membership for the expert
//! scope in the URL, then asks this module for the verdict. Keeping the
//! decision pure makes the denial taxonomy exhaustively testable without a
//! request in flight.

use crate::membership::ExpertMembership;
use crate::role::{ExpertRole, is_allowed};

/// Outcome of evaluating a caller against an expert-scoped requirement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExpertAccess {
    /// The caller is a member with sufficient rank.
    Granted {
        /// The caller's role within the scope.
        role: ExpertRole,
    },
    /// The caller has no membership in the scope.
    NotMember,
    /// The caller is a member but below the required rank.
    InsufficientRole {
        /// The caller's actual role within the scope.
        actual: ExpertRole,
    },
}

/// Evaluates a caller's membership against a required expert role.
#[must_use]
pub fn evaluate_expert_access(
    membership: Option<&ExpertMembership>,
    required: ExpertRole,
) -> ExpertAccess {
    match membership {
        None => ExpertAccess::NotMember,
        Some(m) if is_allowed(Some(m.role()), Some(required)) => {
            ExpertAccess::Granted { role: m.role() }
        }
        Some(m) => ExpertAccess::InsufficientRole { actual: m.role() },
    }
}
