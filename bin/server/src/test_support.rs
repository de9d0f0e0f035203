//! In-memory stores and fixtures for exercising the HTTP stack in tests.
//!
//! The store implements all three storage seams over plain collections so
//! router-level tests can drive the real middleware chain — including the
//! deny-audit path — without Postgres. Audit writes can be made to fail on
//! demand to exercise the strict/lenient policies.

use async_trait::async_trait;
use chrono::Duration;
use coursegram_authz::ExpertMembership;
use coursegram_core::{ExpertId, UserId};
use coursegram_platform_access::{PlatformRole, TokenService, User};
use hmac::{Hmac, Mac};
use sha2::Sha256;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};
use std::sync::{Arc, Mutex};

use crate::audit::{AuditCursor, AuditEntry, AuditFilter, AuditService};
use crate::auth::AppState;
use crate::auth::db::{ExpertMemberStore, UserStore};
use crate::config::{RuntimeMode, TelegramConfig};
use crate::db::{AuditStore, StoreError};

/// Bot token the test state is configured with.
pub const TEST_BOT_TOKEN: &str = "12345:TEST-bot-token";

/// Token signing secret the test state is configured with.
pub const TEST_TOKEN_SECRET: &str = "test-token-secret";

static NEXT_TELEGRAM_ID: AtomicI64 = AtomicI64::new(1_000);

/// In-memory implementation of every storage seam.
#[derive(Default)]
pub struct MemoryStore {
    users: Mutex<Vec<User>>,
    members: Mutex<HashMap<(ExpertId, UserId), ExpertMembership>>,
    entries: Mutex<Vec<AuditEntry>>,
    fail_audit_writes: AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn insert_user(&self, user: &User) {
        self.users.lock().expect("users lock").push(user.clone());
    }

    pub fn insert_membership(&self, membership: &ExpertMembership) {
        self.members.lock().expect("members lock").insert(
            (membership.expert_id(), membership.user_id()),
            membership.clone(),
        );
    }

    pub fn audit_entries(&self) -> Vec<AuditEntry> {
        self.entries.lock().expect("entries lock").clone()
    }

    pub fn entries_for_action(&self, action: &str) -> Vec<AuditEntry> {
        self.audit_entries()
            .into_iter()
            .filter(|e| e.action == action)
            .collect()
    }

    /// Makes every subsequent audit append fail.
    pub fn fail_audit_writes(&self, fail: bool) {
        self.fail_audit_writes.store(fail, Ordering::SeqCst);
    }
}

#[async_trait]
impl UserStore for MemoryStore {
    async fn find_by_id(&self, id: UserId) -> coursegram_core::Result<Option<User>, StoreError> {
        Ok(self
            .users
            .lock()
            .expect("users lock")
            .iter()
            .find(|u| u.id() == id)
            .cloned())
    }

    async fn find_by_telegram_id(
        &self,
        telegram_id: i64,
    ) -> coursegram_core::Result<Option<User>, StoreError> {
        Ok(self
            .users
            .lock()
            .expect("users lock")
            .iter()
            .find(|u| u.telegram_id() == telegram_id)
            .cloned())
    }

    async fn create(&self, user: &User) -> coursegram_core::Result<(), StoreError> {
        self.insert_user(user);
        Ok(())
    }

    async fn update(&self, user: &User) -> coursegram_core::Result<(), StoreError> {
        let mut users = self.users.lock().expect("users lock");
        if let Some(existing) = users.iter_mut().find(|u| u.id() == user.id()) {
            *existing = user.clone();
        }
        Ok(())
    }
}

#[async_trait]
impl ExpertMemberStore for MemoryStore {
    async fn find(
        &self,
        expert_id: ExpertId,
        user_id: UserId,
    ) -> coursegram_core::Result<Option<ExpertMembership>, StoreError> {
        Ok(self
            .members
            .lock()
            .expect("members lock")
            .get(&(expert_id, user_id))
            .cloned())
    }

    async fn list_for_expert(
        &self,
        expert_id: ExpertId,
    ) -> coursegram_core::Result<Vec<ExpertMembership>, StoreError> {
        let mut members: Vec<ExpertMembership> = self
            .members
            .lock()
            .expect("members lock")
            .values()
            .filter(|m| m.expert_id() == expert_id)
            .cloned()
            .collect();
        members.sort_by_key(ExpertMembership::created_at);
        Ok(members)
    }

    async fn upsert(
        &self,
        membership: &ExpertMembership,
    ) -> coursegram_core::Result<(), StoreError> {
        self.insert_membership(membership);
        Ok(())
    }

    async fn remove(
        &self,
        expert_id: ExpertId,
        user_id: UserId,
    ) -> coursegram_core::Result<bool, StoreError> {
        Ok(self
            .members
            .lock()
            .expect("members lock")
            .remove(&(expert_id, user_id))
            .is_some())
    }
}

#[async_trait]
impl AuditStore for MemoryStore {
    async fn append(&self, entry: &AuditEntry) -> coursegram_core::Result<(), StoreError> {
        if self.fail_audit_writes.load(Ordering::SeqCst) {
            return Err(StoreError::Database {
                details: "injected audit failure".to_string(),
            }
            .into());
        }
        self.entries.lock().expect("entries lock").push(entry.clone());
        Ok(())
    }

    async fn list(
        &self,
        filter: &AuditFilter,
        cursor: Option<&AuditCursor>,
        limit: i64,
    ) -> coursegram_core::Result<Vec<AuditEntry>, StoreError> {
        let mut entries: Vec<AuditEntry> = self
            .entries
            .lock()
            .expect("entries lock")
            .iter()
            .filter(|e| {
                filter
                    .actor_user_id
                    .is_none_or(|actor| e.actor_user_id == Some(actor))
                    && filter.action.as_ref().is_none_or(|a| &e.action == a)
                    && filter
                        .entity_type
                        .as_ref()
                        .is_none_or(|t| e.entity_type.as_ref() == Some(t))
                    && filter
                        .entity_id
                        .as_ref()
                        .is_none_or(|i| e.entity_id.as_ref() == Some(i))
                    && filter
                        .trace_id
                        .as_ref()
                        .is_none_or(|t| e.trace_id.as_ref() == Some(t))
                    && filter.from.is_none_or(|from| e.created_at >= from)
                    && filter.to.is_none_or(|to| e.created_at <= to)
            })
            .filter(|e| {
                cursor.is_none_or(|c| {
                    (e.created_at, e.id.as_ulid()) < (c.created_at, c.id.as_ulid())
                })
            })
            .cloned()
            .collect();

        entries.sort_by(|a, b| {
            (b.created_at, b.id.as_ulid()).cmp(&(a.created_at, a.id.as_ulid()))
        });
        entries.truncate(limit.max(0) as usize);
        Ok(entries)
    }

    async fn distinct_actions(&self) -> coursegram_core::Result<Vec<String>, StoreError> {
        let mut actions: Vec<String> = self
            .entries
            .lock()
            .expect("entries lock")
            .iter()
            .map(|e| e.action.clone())
            .collect();
        actions.sort();
        actions.dedup();
        Ok(actions)
    }
}

/// Builds application state over the given store.
pub fn state_with(
    store: &Arc<MemoryStore>,
    mode: RuntimeMode,
    strict_audit: bool,
) -> Arc<AppState> {
    Arc::new(AppState::new(
        store.clone(),
        store.clone(),
        AuditService::new(store.clone(), strict_audit),
        TokenService::new(TEST_TOKEN_SECRET, Duration::minutes(30)),
        TelegramConfig {
            bot_token: TEST_BOT_TOKEN.to_string(),
            max_auth_age_seconds: 3600,
        },
        mode,
    ))
}

/// State with the defaults most tests want: test mode, lenient audit.
pub fn test_state(store: &Arc<MemoryStore>) -> Arc<AppState> {
    state_with(store, RuntimeMode::Test, false)
}

/// A stored user with the given platform role and a fresh Telegram id.
pub fn user_with_role(role: PlatformRole) -> User {
    let mut user = User::new(NEXT_TELEGRAM_ID.fetch_add(1, Ordering::SeqCst));
    user.update_profile(Some("tester".to_string()), Some("Test".to_string()), None, None);
    user.set_platform_role(role);
    user
}

/// An `Authorization` header value for the given user.
pub fn bearer_for(state: &AppState, user: &User) -> String {
    let token = state
        .tokens
        .issue(user.id(), user.telegram_id())
        .expect("issue token");
    format!("Bearer {token}")
}

type HmacSha256 = Hmac<Sha256>;

fn hmac_sha256(key: &[u8], message: &[u8]) -> Vec<u8> {
    let mut mac = HmacSha256::new_from_slice(key).expect("HMAC accepts keys of any length");
    mac.update(message);
    mac.finalize().into_bytes().to_vec()
}

/// A validly signed `initData` blob for the test bot token.
pub fn signed_init_data(telegram_id: i64, username: &str) -> String {
    let user_json =
        format!(r#"{{"id":{telegram_id},"first_name":"Test","username":"{username}"}}"#);
    let auth_date = chrono::Utc::now().timestamp().to_string();
    let pairs = [("auth_date", auth_date.as_str()), ("user", user_json.as_str())];

    let mut lines: Vec<String> = pairs.iter().map(|(k, v)| format!("{k}={v}")).collect();
    lines.sort();
    let secret = hmac_sha256(b"WebAppData", TEST_BOT_TOKEN.as_bytes());
    let hash = hex::encode(hmac_sha256(&secret, lines.join("\n").as_bytes()));

    let mut serializer = form_urlencoded::Serializer::new(String::new());
    for (k, v) in pairs {
        serializer.append_pair(k, v);
    }
    serializer.append_pair("hash", &hash);
    serializer.finish()
}
