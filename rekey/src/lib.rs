//! # Rekey
//!
//! Rekey is a self-contained password-reset security subsystem for Rust
//! applications. It issues single-use reset tokens, rate limits requests per
//! `(email, ip)` key, keeps an in-memory security audit log, and sweeps
//! expired data in the background, while letting you own the storage the
//! data lives in.
//!
//! The flow is deliberately enumeration-resistant: requesting a reset for an
//! unknown email returns the same acceptance as for a known one, and both
//! count against the same rate limit.
//!
//! ## Storage Support
//!
//! Rekey currently ships a SQLite backend; any storage can participate by
//! implementing [`RepositoryProvider`](rekey_core::repositories::RepositoryProvider).
//!
//! ## Example
//!
//! ```rust,no_run
//! use rekey::{ClientContext, Rekey};
//! use rekey_storage_sqlite::SqliteRepositoryProvider;
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let pool = sqlx::SqlitePool::connect("sqlite::memory:").await?;
//!     let repositories = Arc::new(SqliteRepositoryProvider::new(pool));
//!
//!     let rekey = Rekey::new(repositories);
//!     rekey.migrate().await?;
//!
//!     let client = ClientContext::new("203.0.113.7");
//!     let outcome = rekey
//!         .request_password_reset("user@example.com", &client)
//!         .await?;
//!     println!("{}", outcome.message());
//!
//!     Ok(())
//! }
//! ```
pub mod builder;

pub use builder::{RekeyBuilder, RekeyBuilderError};

use std::sync::Arc;

use chrono::Duration;
use rekey_core::{
    repositories::{
        AttemptRepositoryAdapter, RepositoryProvider, TokenRepositoryAdapter,
        UserRepositoryAdapter,
    },
    services::{CleanupService, PasswordResetService, RateLimitService, SecurityAuditLog},
};

/// Re-export core types from rekey_core
///
/// These types are commonly used when working with the Rekey API.
pub use rekey_core::{
    CleanupReport, Error, RateLimitConfig, RateLimitDecision, ResetAttempt, ResetToken, User,
    UserId,
    services::{
        ClientContext, ResetNotifier, ResetOutcome, ResetRejection, ResetRequestOutcome,
        SecurityEvent, SecurityEventType, SuspiciousActivityReport, TokenRejection,
        TokenValidation,
    },
};

/// Re-export storage backends
///
/// These storage implementations are available when the corresponding feature is enabled.
#[cfg(feature = "sqlite")]
pub use rekey_storage_sqlite::SqliteRepositoryProvider;

/// The main coordinator for the password-reset subsystem.
///
/// `Rekey` wires the reset service, rate limiter, audit log, and cleanup
/// sweeper to a single repository provider and exposes the operations an
/// application's HTTP layer calls.
///
/// # Example
///
/// ```rust,no_run
/// use rekey::{ClientContext, Rekey};
/// use rekey_storage_sqlite::SqliteRepositoryProvider;
/// use std::sync::Arc;
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let pool = sqlx::SqlitePool::connect("sqlite::memory:").await?;
///     let rekey = Rekey::new(Arc::new(SqliteRepositoryProvider::new(pool)));
///     rekey.migrate().await?;
///     rekey.start_cleanup();
///
///     let client = ClientContext::new("203.0.113.7");
///     let validation = rekey.validate_reset_token("deadbeef", &client).await?;
///     assert!(!validation.is_valid());
///     Ok(())
/// }
/// ```
pub struct Rekey<R: RepositoryProvider> {
    repositories: Arc<R>,
    reset_service: Arc<
        PasswordResetService<
            UserRepositoryAdapter<R>,
            TokenRepositoryAdapter<R>,
            AttemptRepositoryAdapter<R>,
        >,
    >,
    rate_limiter: Arc<RateLimitService<AttemptRepositoryAdapter<R>>>,
    audit: Arc<SecurityAuditLog>,
    cleanup: Arc<CleanupService<TokenRepositoryAdapter<R>, AttemptRepositoryAdapter<R>>>,
}

impl<R: RepositoryProvider> Rekey<R> {
    /// Create a new Rekey instance with default configuration.
    ///
    /// Defaults: 5 attempts per 15-minute window with a 30-minute block,
    /// 15-minute token lifetime, a 1000-event audit log, and no notifier
    /// (issued tokens are logged as undeliverable until one is attached via
    /// [`RekeyBuilder`]).
    pub fn new(repositories: Arc<R>) -> Self {
        Self::assemble(
            repositories,
            None,
            RateLimitConfig::default(),
            Duration::minutes(15),
            None,
        )
    }

    pub(crate) fn assemble(
        repositories: Arc<R>,
        notifier: Option<Arc<dyn ResetNotifier>>,
        rate_limit_config: RateLimitConfig,
        token_ttl: Duration,
        audit_capacity: Option<usize>,
    ) -> Self {
        // Create repository adapters
        let user_repo = Arc::new(UserRepositoryAdapter::new(repositories.clone()));
        let token_repo = Arc::new(TokenRepositoryAdapter::new(repositories.clone()));
        let attempt_repo = Arc::new(AttemptRepositoryAdapter::new(repositories.clone()));

        let audit = Arc::new(match audit_capacity {
            Some(capacity) => SecurityAuditLog::with_capacity(capacity),
            None => SecurityAuditLog::new(),
        });
        let rate_limiter = Arc::new(RateLimitService::new(attempt_repo.clone(), rate_limit_config));

        let mut reset_service = PasswordResetService::new(
            user_repo,
            token_repo.clone(),
            rate_limiter.clone(),
            audit.clone(),
        )
        .with_token_ttl(token_ttl);
        if let Some(notifier) = notifier {
            reset_service = reset_service.with_notifier(notifier);
        }

        let cleanup = Arc::new(CleanupService::new(token_repo, attempt_repo));

        Self {
            repositories,
            reset_service: Arc::new(reset_service),
            rate_limiter,
            audit,
            cleanup,
        }
    }

    /// Run storage migrations.
    pub async fn migrate(&self) -> Result<(), Error> {
        self.repositories.migrate().await
    }

    /// Check that the storage backend is reachable.
    pub async fn health_check(&self) -> Result<(), Error> {
        self.repositories.health_check().await
    }

    /// Request a password reset for `email`.
    ///
    /// See [`PasswordResetService::request_password_reset`].
    pub async fn request_password_reset(
        &self,
        email: &str,
        client: &ClientContext,
    ) -> Result<ResetRequestOutcome, Error> {
        self.reset_service.request_password_reset(email, client).await
    }

    /// Check a reset token without consuming it.
    pub async fn validate_reset_token(
        &self,
        token: &str,
        client: &ClientContext,
    ) -> Result<TokenValidation, Error> {
        self.reset_service.validate_reset_token(token, client).await
    }

    /// Redeem a reset token and set the user's new password.
    pub async fn reset_password_with_token(
        &self,
        token: &str,
        new_password: &str,
        client: &ClientContext,
    ) -> Result<ResetOutcome, Error> {
        self.reset_service
            .reset_password_with_token(token, new_password, client)
            .await
    }

    /// Forgive recorded reset attempts for a key and lift any block.
    pub async fn clear_reset_attempts(
        &self,
        email: &str,
        ip_address: &str,
    ) -> Result<(), Error> {
        self.rate_limiter.clear_attempts(email, ip_address).await
    }

    /// The security audit log, for dashboards and admin endpoints.
    pub fn audit_log(&self) -> Arc<SecurityAuditLog> {
        self.audit.clone()
    }

    /// The most recent security events, newest first.
    pub fn recent_security_events(&self, limit: usize) -> Vec<SecurityEvent> {
        self.audit.recent_events(limit)
    }

    /// Scan recent events for IPs and emails with anomalous activity.
    pub fn suspicious_activity(&self, window_minutes: i64) -> SuspiciousActivityReport {
        self.audit.suspicious_activity(window_minutes)
    }

    /// Start the hourly background cleanup task.
    ///
    /// Returns `false` if it is already running.
    pub fn start_cleanup(&self) -> bool {
        self.cleanup.start()
    }

    /// Stop the background cleanup task.
    ///
    /// Returns `false` if it was not running.
    pub fn stop_cleanup(&self) -> bool {
        self.cleanup.stop()
    }

    pub fn cleanup_running(&self) -> bool {
        self.cleanup.is_running()
    }

    /// Run a single cleanup sweep inline.
    pub async fn run_cleanup_once(&self) -> Result<CleanupReport, Error> {
        self.cleanup.run_once().await
    }
}
