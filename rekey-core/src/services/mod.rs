//! Service layer for the password-reset flow
//!
//! This module contains the concrete services: the rate limiter gating reset
//! requests, the reset orchestration itself, the in-memory security audit
//! log, and the background cleanup sweeper.

pub mod audit;
pub mod cleanup;
pub mod notifier;
pub mod password_reset;
pub mod rate_limit;

pub use audit::{SecurityAuditLog, SecurityEvent, SecurityEventType, SuspiciousActivityReport};
pub use cleanup::CleanupService;
pub use notifier::ResetNotifier;
pub use password_reset::{
    ClientContext, PasswordResetService, ResetOutcome, ResetRejection, ResetRequestOutcome,
    TokenRejection, TokenValidation,
};
pub use rate_limit::RateLimitService;
