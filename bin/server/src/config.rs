//! Centralized server configuration.
//!
//! This module provides strongly-typed configuration for the server,
//! loaded via the `config` crate from environment variables.
//!
//! Environment-conditional behavior is modeled through [`RuntimeMode`]
//! threaded into application state; guard logic never reads the environment
//! directly.

use serde::Deserialize;

/// The environment the server believes it is running in.
///
/// Only one behavior hangs off this: outside production, the expert-scope
/// guard accepts an `x-expert-id` header when the URL carries no expert
/// path parameter. In production the header is never honored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RuntimeMode {
    /// Local development.
    Development,
    /// Automated test runs.
    Test,
    /// Production deployment.
    Production,
}

impl RuntimeMode {
    /// Returns true when running in production.
    #[must_use]
    pub fn is_production(self) -> bool {
        matches!(self, Self::Production)
    }
}

/// Server configuration composed from section configs.
#[derive(Debug, Deserialize)]
pub struct ServerConfig {
    /// PostgreSQL database connection URL.
    pub database_url: String,

    /// Address the HTTP listener binds to.
    #[serde(default = "default_listen_addr")]
    pub listen_addr: String,

    /// Runtime mode. Defaults to production so the development-only
    /// expert-header fallback requires an explicit opt-in.
    #[serde(default = "default_mode")]
    pub mode: RuntimeMode,

    /// Telegram login configuration.
    pub telegram: TelegramConfig,

    /// Session token configuration.
    pub token: TokenConfig,

    /// Audit trail configuration.
    #[serde(default)]
    pub audit: AuditConfig,
}

/// Telegram Mini-App login configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct TelegramConfig {
    /// Bot token shared with Telegram; the `initData` signing secret is
    /// derived from it.
    pub bot_token: String,

    /// Maximum accepted age of an `initData` blob, in seconds.
    #[serde(default = "default_max_auth_age_seconds")]
    pub max_auth_age_seconds: i64,
}

/// Session token configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct TokenConfig {
    /// HMAC signing secret for session tokens.
    pub secret: String,

    /// Token lifetime in minutes. Short lifetimes bound how long a stale
    /// credential stays usable; there is no revocation list.
    #[serde(default = "default_token_ttl_minutes")]
    pub ttl_minutes: i64,
}

/// Audit trail configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct AuditConfig {
    /// When true, a failed audit write fails the request instead of being
    /// logged and swallowed. Used by test deployments to make the
    /// deny-audit invariant observable.
    #[serde(default)]
    pub strict: bool,
}

fn default_listen_addr() -> String {
    "0.0.0.0:3000".to_string()
}

fn default_mode() -> RuntimeMode {
    RuntimeMode::Production
}

fn default_max_auth_age_seconds() -> i64 {
    3600
}

fn default_token_ttl_minutes() -> i64 {
    30
}

impl Default for AuditConfig {
    fn default() -> Self {
        Self { strict: false }
    }
}

impl ServerConfig {
    /// Loads configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns an error if required configuration is missing or invalid.
    pub fn from_env() -> Result<Self, config::ConfigError> {
        config::Config::builder()
            .add_source(
                config::Environment::default()
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn audit_config_defaults_to_lenient() {
        let config = AuditConfig::default();
        assert!(!config.strict);
    }

    #[test]
    fn runtime_mode_production_check() {
        assert!(RuntimeMode::Production.is_production());
        assert!(!RuntimeMode::Development.is_production());
        assert!(!RuntimeMode::Test.is_production());
    }

    #[test]
    fn runtime_mode_deserializes_lowercase() {
        let mode: RuntimeMode = serde_json::from_str("\"development\"").expect("deserialize");
        assert_eq!(mode, RuntimeMode::Development);
    }

    #[test]
    fn defaults_are_production_safe() {
        assert_eq!(default_mode(), RuntimeMode::Production);
        assert_eq!(default_token_ttl_minutes(), 30);
        assert_eq!(default_max_auth_age_seconds(), 3600);
    }
}
