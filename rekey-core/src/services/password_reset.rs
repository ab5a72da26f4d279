//! Password-reset orchestration.
//!
//! The service is the hub of the subsystem: a reset request runs strictly
//! through rate-limit check, user lookup, token issuance, notification, and
//! audit, in that order. Validation and redemption run token lookup and
//! audit.
//!
//! # Anti-enumeration
//!
//! A reset request returns the same generic acceptance whether or not an
//! account exists for the email, and the rate limiter counts both paths the
//! same way. Only rate limiting and malformed input deviate from the uniform
//! response. Token-state messages (expired / already used) are allowed to
//! differ because they disclose token validity, not account existence.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use serde_json::json;

use crate::{
    Error, NewResetToken, ResetToken, crypto,
    repositories::{ResetAttemptRepository, ResetTokenRepository, UserRepository},
    services::{
        RateLimitService, ResetNotifier, SecurityAuditLog, SecurityEvent, SecurityEventType,
    },
};

/// Minimum accepted length for a replacement password, in characters.
pub const MIN_PASSWORD_LENGTH: usize = 6;

/// Uniform response for accepted reset requests, existing account or not.
pub const GENERIC_RESET_MESSAGE: &str =
    "If an account with that email exists, you will receive a password reset link shortly.";

/// Network identity of the caller, supplied by the HTTP layer.
///
/// Audit events carry the IP (and user agent when known) of whoever drove
/// the operation, so every service entry point takes one of these.
#[derive(Debug, Clone)]
pub struct ClientContext {
    pub ip_address: String,
    pub user_agent: Option<String>,
}

impl ClientContext {
    pub fn new(ip_address: impl Into<String>) -> Self {
        Self {
            ip_address: ip_address.into(),
            user_agent: None,
        }
    }

    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = Some(user_agent.into());
        self
    }
}

/// Outcome of a reset request.
#[derive(Debug, Clone, PartialEq)]
pub enum ResetRequestOutcome {
    /// The request was accepted. Deliberately silent about whether a token
    /// was actually issued.
    Accepted,

    /// The key is rate limited; nothing was issued.
    RateLimited {
        blocked_until: DateTime<Utc>,
        message: String,
    },
}

impl ResetRequestOutcome {
    pub fn success(&self) -> bool {
        matches!(self, Self::Accepted)
    }

    pub fn message(&self) -> &str {
        match self {
            Self::Accepted => GENERIC_RESET_MESSAGE,
            Self::RateLimited { message, .. } => message,
        }
    }

    pub fn blocked_until(&self) -> Option<DateTime<Utc>> {
        match self {
            Self::Accepted => None,
            Self::RateLimited { blocked_until, .. } => Some(*blocked_until),
        }
    }
}

/// Why a presented token is not redeemable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenRejection {
    Missing,
    NotFound,
    Expired,
    AlreadyUsed,
}

impl TokenRejection {
    pub fn message(&self) -> &'static str {
        match self {
            Self::Missing => "Token is required.",
            Self::NotFound => "Invalid reset token.",
            Self::Expired => "Reset token expired.",
            Self::AlreadyUsed => "Reset token already used.",
        }
    }

    fn reason(&self) -> &'static str {
        match self {
            Self::Missing => "missing",
            Self::NotFound => "not_found",
            Self::Expired => "expired",
            Self::AlreadyUsed => "already_used",
        }
    }
}

/// Outcome of a non-consuming token check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenValidation {
    Valid,
    Invalid(TokenRejection),
}

impl TokenValidation {
    pub fn is_valid(&self) -> bool {
        matches!(self, Self::Valid)
    }

    pub fn message(&self) -> Option<&'static str> {
        match self {
            Self::Valid => None,
            Self::Invalid(rejection) => Some(rejection.message()),
        }
    }
}

/// Why a redemption was refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResetRejection {
    MissingFields,
    PasswordTooShort,
    Token(TokenRejection),
    UserNotFound,
}

impl ResetRejection {
    pub fn message(&self) -> &'static str {
        match self {
            Self::MissingFields => "Token and new password are required.",
            Self::PasswordTooShort => "Password must be at least 6 characters.",
            Self::Token(rejection) => rejection.message(),
            Self::UserNotFound => "User not found.",
        }
    }
}

/// Outcome of a redemption.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResetOutcome {
    Completed,
    Rejected(ResetRejection),
}

impl ResetOutcome {
    pub fn success(&self) -> bool {
        matches!(self, Self::Completed)
    }

    pub fn message(&self) -> &'static str {
        match self {
            Self::Completed => "Password reset successfully.",
            Self::Rejected(rejection) => rejection.message(),
        }
    }
}

/// Service orchestrating the password-reset flow.
pub struct PasswordResetService<U, T, A>
where
    U: UserRepository,
    T: ResetTokenRepository,
    A: ResetAttemptRepository,
{
    users: Arc<U>,
    tokens: Arc<T>,
    rate_limiter: Arc<RateLimitService<A>>,
    audit: Arc<SecurityAuditLog>,
    notifier: Option<Arc<dyn ResetNotifier>>,
    token_ttl: Duration,
}

impl<U, T, A> PasswordResetService<U, T, A>
where
    U: UserRepository,
    T: ResetTokenRepository,
    A: ResetAttemptRepository,
{
    pub fn new(
        users: Arc<U>,
        tokens: Arc<T>,
        rate_limiter: Arc<RateLimitService<A>>,
        audit: Arc<SecurityAuditLog>,
    ) -> Self {
        Self {
            users,
            tokens,
            rate_limiter,
            audit,
            notifier: None,
            token_ttl: Duration::minutes(15),
        }
    }

    /// Attach an out-of-band delivery channel for reset links.
    pub fn with_notifier(mut self, notifier: Arc<dyn ResetNotifier>) -> Self {
        self.notifier = Some(notifier);
        self
    }

    /// Override the default 15-minute token lifetime.
    pub fn with_token_ttl(mut self, token_ttl: Duration) -> Self {
        self.token_ttl = token_ttl;
        self
    }

    /// Handle a reset request for `email`.
    ///
    /// Rate limiting applies whether or not an account exists, and the
    /// returned acceptance is identical on both paths. Notifier failures are
    /// logged and swallowed: the token stays valid and could still reach the
    /// user by other means (e.g., support), and surfacing the failure would
    /// leak delivery-channel state.
    pub async fn request_password_reset(
        &self,
        email: &str,
        client: &ClientContext,
    ) -> Result<ResetRequestOutcome, Error> {
        let decision = self
            .rate_limiter
            .check_rate_limit(email, &client.ip_address)
            .await?;

        if !decision.allowed {
            // A denied decision always returns here, even if a hand-built
            // decision carries no block timestamp.
            let blocked_until = decision.blocked_until.unwrap_or_else(|| {
                Utc::now() + self.rate_limiter.config().block_duration
            });
            if decision.newly_blocked {
                self.audit.log_event(
                    self.event(SecurityEventType::RateLimitExceeded, Some(email), client)
                        .with_details(json!({
                            "blocked_until": blocked_until.to_rfc3339(),
                        })),
                );
            }
            self.audit.log_event(
                self.event(SecurityEventType::PasswordResetBlocked, Some(email), client)
                    .with_details(json!({
                        "blocked_until": blocked_until.to_rfc3339(),
                    })),
            );
            return Ok(ResetRequestOutcome::RateLimited {
                blocked_until,
                message: RateLimitService::<A>::blocked_message(&decision),
            });
        }

        let Some(user) = self.users.find_by_email(email).await? else {
            // No account: same acceptance, nothing issued.
            return Ok(ResetRequestOutcome::Accepted);
        };

        let token = crypto::generate_reset_token();
        let expires_at = Utc::now() + self.token_ttl;
        self.tokens
            .create_token(NewResetToken::new(user.id.clone(), token.clone(), expires_at))
            .await?;

        self.audit.log_event(
            self.event(SecurityEventType::PasswordResetRequested, Some(email), client)
                .with_details(json!({ "expires_at": expires_at.to_rfc3339() })),
        );

        match &self.notifier {
            Some(notifier) => {
                if let Err(error) = notifier
                    .send_password_reset_email(email, &token, user.name.as_deref())
                    .await
                {
                    tracing::warn!(error = %error, "failed to deliver password reset email");
                }
            }
            None => {
                tracing::warn!("no notifier configured; reset token was generated but not delivered");
            }
        }

        Ok(ResetRequestOutcome::Accepted)
    }

    /// Check a token without consuming it, for pre-flight form validation.
    pub async fn validate_reset_token(
        &self,
        token: &str,
        client: &ClientContext,
    ) -> Result<TokenValidation, Error> {
        match self.inspect_token(token).await? {
            Ok(_) => Ok(TokenValidation::Valid),
            Err(rejection) => {
                self.audit.log_event(
                    self.event(SecurityEventType::InvalidTokenAttempt, None, client)
                        .with_details(json!({
                            "operation": "validate",
                            "reason": rejection.reason(),
                        })),
                );
                Ok(TokenValidation::Invalid(rejection))
            }
        }
    }

    /// Redeem a token: set the user's password and consume the token.
    ///
    /// The `used` flag is flipped with a storage-level compare-and-set
    /// *before* the password hash is written. Concurrent redeemers serialize
    /// on the CAS, so at most one succeeds; a crash between the two writes
    /// burns the token without changing the password, which fails safe (the
    /// user requests a new link) and never leaves a replayable token behind.
    pub async fn reset_password_with_token(
        &self,
        token: &str,
        new_password: &str,
        client: &ClientContext,
    ) -> Result<ResetOutcome, Error> {
        if token.is_empty() || new_password.is_empty() {
            return Ok(ResetOutcome::Rejected(ResetRejection::MissingFields));
        }
        if new_password.chars().count() < MIN_PASSWORD_LENGTH {
            return Ok(ResetOutcome::Rejected(ResetRejection::PasswordTooShort));
        }

        let row = match self.inspect_token(token).await? {
            Ok(row) => row,
            Err(rejection) => {
                self.log_redeem_rejection(rejection, client);
                return Ok(ResetOutcome::Rejected(ResetRejection::Token(rejection)));
            }
        };

        let Some(user) = self.users.find_by_id(&row.user_id).await? else {
            return Ok(ResetOutcome::Rejected(ResetRejection::UserNotFound));
        };

        let hash = password_auth::generate_hash(new_password);

        if !self.tokens.mark_used(&row.id).await? {
            self.log_redeem_rejection(TokenRejection::AlreadyUsed, client);
            return Ok(ResetOutcome::Rejected(ResetRejection::Token(
                TokenRejection::AlreadyUsed,
            )));
        }

        self.users.set_password_hash(&user.id, &hash).await?;

        self.audit.log_event(self.event(
            SecurityEventType::PasswordResetCompleted,
            Some(&user.email),
            client,
        ));

        Ok(ResetOutcome::Completed)
    }

    /// Classify a presented token: the usable row, or why it is not.
    async fn inspect_token(
        &self,
        token: &str,
    ) -> Result<Result<ResetToken, TokenRejection>, Error> {
        if token.is_empty() {
            return Ok(Err(TokenRejection::Missing));
        }

        let Some(row) = self.tokens.find_by_token(token).await? else {
            return Ok(Err(TokenRejection::NotFound));
        };

        let now = Utc::now();
        if row.is_expired(now) {
            return Ok(Err(TokenRejection::Expired));
        }
        if row.used {
            return Ok(Err(TokenRejection::AlreadyUsed));
        }

        Ok(Ok(row))
    }

    fn log_redeem_rejection(&self, rejection: TokenRejection, client: &ClientContext) {
        self.audit.log_event(
            self.event(SecurityEventType::InvalidTokenAttempt, None, client)
                .with_details(json!({
                    "operation": "redeem",
                    "reason": rejection.reason(),
                })),
        );
    }

    fn event(
        &self,
        event_type: SecurityEventType,
        email: Option<&str>,
        client: &ClientContext,
    ) -> SecurityEvent {
        let mut event = SecurityEvent::new(event_type, client.ip_address.clone());
        if let Some(email) = email {
            event = event.with_email(email);
        }
        if let Some(user_agent) = &client.user_agent {
            event = event.with_user_agent(user_agent.clone());
        }
        event
    }
}
