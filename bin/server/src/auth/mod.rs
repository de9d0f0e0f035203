//! Authentication module for the coursegram server.
//!
//! This module provides:
//! - Telegram Mini-App login (`POST /auth/telegram`)
//! - Bearer-token authentication middleware for all other routes
//! - Database-backed user and expert-membership stores
//!
//! # Authorization Model
//!
//! Authentication establishes *who* is calling: the bearer token is
//! validated, the user record is loaded, and the banned-account gate runs
//! before anything else. Role checks are layered on top by the guards in
//! [`crate::guard`] — a route declares the platform and/or expert role it
//! requires, and an undeclared route is authenticated-only.
//!
//! Stateless signed tokens are used because:
//! - Every request validates locally with zero datastore reads
//! - The short TTL bounds how long role or ban changes take effect
//! - Re-login through the Telegram handshake is cheap for Mini-App clients

pub mod db;
pub mod middleware;
pub mod routes;

pub use middleware::{CurrentUser, require_auth};

use coursegram_platform_access::TokenService;
use std::sync::Arc;

use crate::audit::AuditService;
use crate::config::{RuntimeMode, TelegramConfig};
use db::{ExpertMemberStore, UserStore};

/// Shared application state.
pub struct AppState {
    /// User storage.
    pub users: Arc<dyn UserStore>,
    /// Expert membership storage.
    pub members: Arc<dyn ExpertMemberStore>,
    /// Audit trail writer and query service.
    pub audit: AuditService,
    /// Session token issuing and validation.
    pub tokens: TokenService,
    /// Telegram login configuration.
    pub telegram: TelegramConfig,
    /// Runtime mode; consulted only by the expert-scope fallback.
    pub mode: RuntimeMode,
}

impl AppState {
    /// Creates a new application state.
    pub fn new(
        users: Arc<dyn UserStore>,
        members: Arc<dyn ExpertMemberStore>,
        audit: AuditService,
        tokens: TokenService,
        telegram: TelegramConfig,
        mode: RuntimeMode,
    ) -> Self {
        Self {
            users,
            members,
            audit,
            tokens,
            telegram,
            mode,
        }
    }
}
