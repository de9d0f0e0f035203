//! Expert membership records.
//!
//! A membership binds a user to one expert (tenant) scope with a single
//! expert-scoped role. The `(expert_id, user_id)` pair is unique; storage
//! enforces that with a composite key rather than any locking scheme.

use chrono::{DateTime, Utc};
use coursegram_core::{ExpertId, UserId};
use serde::{Deserialize, Serialize};

use crate::role::ExpertRole;

/// A user's membership in one expert scope.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExpertMembership {
    /// The expert (tenant) scope.
    expert_id: ExpertId,
    /// The member.
    user_id: UserId,
    /// The member's role within this scope.
    role: ExpertRole,
    /// When the membership was created.
    created_at: DateTime<Utc>,
}

impl ExpertMembership {
    /// Creates a new membership.
    #[must_use]
    pub fn new(expert_id: ExpertId, user_id: UserId, role: ExpertRole) -> Self {
        Self {
            expert_id,
            user_id,
            role,
            created_at: Utc::now(),
        }
    }

    /// Creates a membership with all fields specified.
    ///
    /// Use this when reconstituting a membership from storage.
    #[must_use]
    pub fn with_all_fields(
        expert_id: ExpertId,
        user_id: UserId,
        role: ExpertRole,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            expert_id,
            user_id,
            role,
            created_at,
        }
    }

    /// Returns the expert scope.
    #[must_use]
    pub fn expert_id(&self) -> ExpertId {
        self.expert_id
    }

    /// Returns the member's user id.
    #[must_use]
    pub fn user_id(&self) -> UserId {
        self.user_id
    }

    /// Returns the member's role within the scope.
    #[must_use]
    pub fn role(&self) -> ExpertRole {
        self.role
    }

    /// Returns when the membership was created.
    #[must_use]
    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Changes the member's role.
    pub fn set_role(&mut self, role: ExpertRole) {
        self.role = role;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_membership_has_given_fields() {
        let expert_id = ExpertId::new();
        let user_id = UserId::new();

        let membership = ExpertMembership::new(expert_id, user_id, ExpertRole::Reviewer);

        assert_eq!(membership.expert_id(), expert_id);
        assert_eq!(membership.user_id(), user_id);
        assert_eq!(membership.role(), ExpertRole::Reviewer);
    }

    #[test]
    fn set_role_changes_role() {
        let mut membership =
            ExpertMembership::new(ExpertId::new(), UserId::new(), ExpertRole::Support);
        membership.set_role(ExpertRole::Manager);
        assert_eq!(membership.role(), ExpertRole::Manager);
    }

    #[test]
    fn membership_serialization_roundtrip() {
        let membership =
            ExpertMembership::new(ExpertId::new(), UserId::new(), ExpertRole::Owner);

        let json = serde_json::to_string(&membership).expect("serialize");
        let parsed: ExpertMembership = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(membership, parsed);
    }
}
