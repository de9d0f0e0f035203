//! Database storage for the coursegram server.
//!
//! Repositories sit behind `async-trait` store traits so the HTTP layer can
//! be exercised end-to-end against in-memory implementations. The Postgres
//! implementations here are the production ones; errors cross the seam as
//! `Report<StoreError>` with layer context added by callers.

pub mod audit;

pub use audit::{AuditStore, PgAuditStore};

use std::fmt;

/// Errors from storage operations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// The database rejected or failed the operation.
    Database { details: String },
    /// A stored row could not be decoded into its domain type.
    Decode { details: String },
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Database { details } => {
                write!(f, "database error: {details}")
            }
            Self::Decode { details } => {
                write!(f, "row decode error: {details}")
            }
        }
    }
}

impl std::error::Error for StoreError {}

impl StoreError {
    /// Wraps a sqlx error.
    #[must_use]
    pub fn database(e: &sqlx::Error) -> Self {
        Self::Database {
            details: e.to_string(),
        }
    }
}
