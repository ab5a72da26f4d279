//! Core functionality for the rekey password-reset security subsystem
//!
//! This crate contains the domain types, repository traits, and services that
//! make up the password-reset flow: token issuance, rate limiting, one-time
//! redemption, security auditing, and background cleanup.
//!
//! The crate is storage-agnostic: durable state (reset tokens, attempt
//! counters, the user record store) is reached through the repository traits
//! in [`repositories`], and a concrete backend supplies a
//! [`repositories::RepositoryProvider`]. Out-of-band delivery of reset links
//! goes through the [`services::ResetNotifier`] seam.

pub mod crypto;
pub mod error;
pub mod id;
pub mod repositories;
pub mod services;
pub mod storage;
pub mod user;

pub use error::Error;
pub use storage::{
    CleanupReport, NewResetToken, RateLimitConfig, RateLimitDecision, ResetAttempt, ResetToken,
};
pub use user::{User, UserId};
