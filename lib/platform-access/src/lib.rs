//! Platform access and authentication for coursegram.
//!
//! This crate provides:
//! - Telegram Mini-App `initData` signature verification (`verify_init_data`)
//! - Stateless, HMAC-signed session tokens (`TokenService`)
//! - The `User` domain type with platform role and ban state
//! - The ordered platform role hierarchy (`PlatformRole`)
//!
//! # Access Control Model
//!
//! Identity comes from Telegram: the Mini-App client sends the signed
//! `initData` blob, which is verified locally against the bot token. A
//! successful login mints a short-lived signed session token; every other
//! request presents that token as a bearer credential.
//!
//! Platform-wide authorization is a single ordered hierarchy
//! (`user < moderator < admin < owner`) attached to the user record.
//! Expert-scoped (per-tenant) roles live in the `coursegram-authz` crate.
//!
//! # Example
//!
//! ```
//! use coursegram_platform_access::{PlatformRole, TokenService, User};
//! use chrono::Duration;
//!
//! // Create a user after a verified Telegram login
//! let mut user = User::new(123_456_789);
//! user.update_profile(
//!     Some("alice".to_string()),
//!     Some("Alice".to_string()),
//!     None,
//!     None,
//! );
//!
//! // Mint a session token for them
//! let tokens = TokenService::new("server-secret", Duration::minutes(30));
//! let token = tokens.issue(user.id(), user.telegram_id()).expect("issue");
//! let identity = tokens.validate(&token).expect("validate");
//!
//! assert_eq!(identity.user_id, user.id());
//! assert!(PlatformRole::Admin.allows(PlatformRole::Moderator));
//! ```

pub mod error;
pub mod role;
pub mod telegram;
pub mod token;
pub mod user;

// Re-export main types at crate root
pub use error::{InitDataError, TokenError};
pub use role::PlatformRole;
pub use telegram::{VerifiedInitData, verify_init_data};
pub use token::{TokenIdentity, TokenService};
pub use user::User;
