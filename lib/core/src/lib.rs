//! Core domain types and utilities for the coursegram platform.
//!
//! This crate provides the foundational types and error handling shared by
//! the coursegram learning-platform backend: strongly-typed entity
//! identifiers and the `Result` alias the other crates layer their own
//! error types on.

pub mod error;
pub mod id;

pub use error::Result;
pub use id::{AuditEntryId, ExpertId, UserId};
