//! The audit trail: durable recording of authorization decisions and
//! privileged mutations, plus the operator read path.
//!
//! Writes are awaited by callers before any denial response leaves the
//! server, which is what makes the deny-audit invariant hold. The write
//! failure policy is caller-selected at construction time: lenient
//! deployments log and swallow storage failures so denials still reach the
//! client, strict (test) deployments propagate them so the invariant is
//! observable.

use base64::Engine as _;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use chrono::{DateTime, Utc};
use coursegram_core::{AuditEntryId, UserId};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use tracing::instrument;
use ulid::Ulid;

use crate::db::{AuditStore, StoreError};

/// Action names recorded in the audit trail.
pub mod action {
    /// A banned account presented otherwise-valid credentials.
    pub const REQUEST_BLOCKED_BANNED: &str = "request.blocked.banned";
    /// The platform-role guard denied a request.
    pub const RBAC_DENIED_PLATFORM_ROLE: &str = "rbac.denied.platform_role";
    /// The expert-role guard denied a non-member.
    pub const RBAC_DENIED_EXPERT_MEMBERSHIP: &str = "rbac.denied.expert_membership";
    /// The expert-role guard denied a member below the required rank.
    pub const RBAC_DENIED_EXPERT_ROLE: &str = "rbac.denied.expert_role";
    /// An admin changed a user's platform role.
    pub const ADMIN_USER_ROLE_CHANGED: &str = "admin.user.role_changed";
    /// An admin banned a user.
    pub const ADMIN_USER_BANNED: &str = "admin.user.banned";
    /// An admin lifted a ban.
    pub const ADMIN_USER_UNBANNED: &str = "admin.user.unbanned";
    /// An expert manager created or updated a membership.
    pub const EXPERT_MEMBER_UPSERTED: &str = "expert.member.upserted";
    /// An expert manager removed a membership.
    pub const EXPERT_MEMBER_REMOVED: &str = "expert.member.removed";
}

/// Maximum page size the operator read path serves.
pub const MAX_PAGE_SIZE: i64 = 200;

/// Page size used when the caller does not specify one.
pub const DEFAULT_PAGE_SIZE: i64 = 50;

/// A stored audit entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuditEntry {
    /// Entry id; tie-breaks the pagination key.
    pub id: AuditEntryId,
    /// When the entry was recorded.
    pub created_at: DateTime<Utc>,
    /// The acting user, when one was identified.
    pub actor_user_id: Option<UserId>,
    /// Dotted action name, e.g. `rbac.denied.platform_role`.
    pub action: String,
    /// Kind of entity the action concerned, e.g. `route` or `user`.
    pub entity_type: Option<String>,
    /// Identifier of the concerned entity.
    pub entity_id: Option<String>,
    /// Trace id of the request that produced the entry.
    pub trace_id: Option<String>,
    /// Action-specific structured payload.
    pub meta: serde_json::Value,
}

/// An audit entry before it is assigned an id and timestamp.
#[derive(Debug, Clone)]
pub struct NewAuditEntry {
    /// The acting user, when one was identified.
    pub actor_user_id: Option<UserId>,
    /// Dotted action name.
    pub action: String,
    /// Kind of entity the action concerned.
    pub entity_type: Option<String>,
    /// Identifier of the concerned entity.
    pub entity_id: Option<String>,
    /// Trace id of the producing request.
    pub trace_id: Option<String>,
    /// Action-specific structured payload.
    pub meta: serde_json::Value,
}

impl NewAuditEntry {
    /// Creates an entry for the given action.
    #[must_use]
    pub fn new(action: impl Into<String>) -> Self {
        Self {
            actor_user_id: None,
            action: action.into(),
            entity_type: None,
            entity_id: None,
            trace_id: None,
            meta: serde_json::Value::Object(Default::default()),
        }
    }

    /// Sets the acting user.
    #[must_use]
    pub fn with_actor(mut self, actor: Option<UserId>) -> Self {
        self.actor_user_id = actor;
        self
    }

    /// Sets the concerned entity.
    #[must_use]
    pub fn with_entity(mut self, entity_type: impl Into<String>, entity_id: impl Into<String>) -> Self {
        self.entity_type = Some(entity_type.into());
        self.entity_id = Some(entity_id.into());
        self
    }

    /// Sets the trace id.
    #[must_use]
    pub fn with_trace(mut self, trace_id: impl Into<String>) -> Self {
        self.trace_id = Some(trace_id.into());
        self
    }

    /// Sets the structured payload.
    #[must_use]
    pub fn with_meta(mut self, meta: serde_json::Value) -> Self {
        self.meta = meta;
        self
    }

    fn into_entry(self) -> AuditEntry {
        AuditEntry {
            id: AuditEntryId::new(),
            created_at: Utc::now(),
            actor_user_id: self.actor_user_id,
            action: self.action,
            entity_type: self.entity_type,
            entity_id: self.entity_id,
            trace_id: self.trace_id,
            meta: self.meta,
        }
    }
}

/// Optional filters for the operator read path. All set fields are ANDed.
#[derive(Debug, Clone, Default)]
pub struct AuditFilter {
    /// Only entries by this actor.
    pub actor_user_id: Option<UserId>,
    /// Only entries with this exact action.
    pub action: Option<String>,
    /// Only entries concerning this entity type.
    pub entity_type: Option<String>,
    /// Only entries concerning this entity id.
    pub entity_id: Option<String>,
    /// Only entries from the request with this trace id.
    pub trace_id: Option<String>,
    /// Only entries recorded at or after this instant.
    pub from: Option<DateTime<Utc>>,
    /// Only entries recorded at or before this instant.
    pub to: Option<DateTime<Utc>>,
}

/// Error returned when decoding an opaque page cursor fails.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseCursorError;

impl fmt::Display for ParseCursorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid audit cursor")
    }
}

impl std::error::Error for ParseCursorError {}

/// Keyset cursor over the `(created_at DESC, id DESC)` order.
///
/// The next page is everything strictly before the cursor's fixed point in
/// that order, so pages stay correct under concurrent inserts: new entries
/// sort before already-served pages and never duplicate into them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AuditCursor {
    /// `created_at` of the last entry served.
    pub created_at: DateTime<Utc>,
    /// `id` of the last entry served.
    pub id: AuditEntryId,
}

impl AuditCursor {
    /// Encodes the cursor into its opaque wire form.
    #[must_use]
    pub fn encode(&self) -> String {
        let raw = format!("{}:{}", self.created_at.timestamp_micros(), self.id.as_ulid());
        URL_SAFE_NO_PAD.encode(raw)
    }

    /// Decodes a cursor from its opaque wire form.
    ///
    /// # Errors
    ///
    /// Returns [`ParseCursorError`] for anything that is not an encoding
    /// this service produced.
    pub fn decode(raw: &str) -> Result<Self, ParseCursorError> {
        let bytes = URL_SAFE_NO_PAD.decode(raw).map_err(|_| ParseCursorError)?;
        let decoded = String::from_utf8(bytes).map_err(|_| ParseCursorError)?;
        let (micros, id) = decoded.split_once(':').ok_or(ParseCursorError)?;
        let micros: i64 = micros.parse().map_err(|_| ParseCursorError)?;
        let created_at = DateTime::from_timestamp_micros(micros).ok_or(ParseCursorError)?;
        let id = Ulid::from_str(id).map_err(|_| ParseCursorError)?;
        Ok(Self {
            created_at,
            id: AuditEntryId::from_ulid(id),
        })
    }
}

/// One page of audit entries.
#[derive(Debug, Clone)]
pub struct AuditPage {
    /// Entries in `(created_at DESC, id DESC)` order.
    pub items: Vec<AuditEntry>,
    /// Cursor for the next page, absent on the last page.
    pub next_cursor: Option<String>,
}

/// Writer and query service over the audit trail.
#[derive(Clone)]
pub struct AuditService {
    store: Arc<dyn AuditStore>,
    strict: bool,
}

impl AuditService {
    /// Creates an audit service.
    ///
    /// With `strict` set, storage failures during [`record`](Self::record)
    /// propagate to the caller and fail the request; otherwise they are
    /// logged and swallowed so the triggering response still goes out.
    #[must_use]
    pub fn new(store: Arc<dyn AuditStore>, strict: bool) -> Self {
        Self { store, strict }
    }

    /// Appends one entry to the trail.
    ///
    /// Callers await this before sending the response the entry describes;
    /// the write happens-before the HTTP response in every mode.
    ///
    /// # Errors
    ///
    /// In strict mode, returns the storage failure.
    #[instrument(skip(self, entry), fields(action = %entry.action))]
    pub async fn record(&self, entry: NewAuditEntry) -> coursegram_core::Result<(), StoreError> {
        let entry = entry.into_entry();
        match self.store.append(&entry).await {
            Ok(()) => Ok(()),
            Err(e) if self.strict => Err(e),
            Err(e) => {
                tracing::warn!(error = %e, action = %entry.action, "audit write failed; denial proceeds");
                Ok(())
            }
        }
    }

    /// Lists entries matching the filter, newest first.
    ///
    /// `limit` is clamped to `1..=MAX_PAGE_SIZE`. One extra row is fetched
    /// to decide whether a next page exists without a second query.
    ///
    /// # Errors
    ///
    /// Returns the storage failure, if any.
    #[instrument(skip(self, filter, cursor))]
    pub async fn list(
        &self,
        filter: &AuditFilter,
        cursor: Option<AuditCursor>,
        limit: i64,
    ) -> coursegram_core::Result<AuditPage, StoreError> {
        let limit = limit.clamp(1, MAX_PAGE_SIZE);
        let mut items = self.store.list(filter, cursor.as_ref(), limit + 1).await?;

        let next_cursor = if items.len() as i64 > limit {
            items.truncate(limit as usize);
            items.last().map(|last| {
                AuditCursor {
                    created_at: last.created_at,
                    id: last.id,
                }
                .encode()
            })
        } else {
            None
        };

        Ok(AuditPage { items, next_cursor })
    }

    /// Returns the distinct action names present in the trail.
    ///
    /// # Errors
    ///
    /// Returns the storage failure, if any.
    pub async fn distinct_actions(&self) -> coursegram_core::Result<Vec<String>, StoreError> {
        self.store.distinct_actions().await
    }
}
