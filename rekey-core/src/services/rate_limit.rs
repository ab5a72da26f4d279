//! Reset-request rate limiting.
//!
//! Gates password-reset requests per `(email, ip_address)` key to blunt
//! brute-force, account enumeration, and email bombing. Attempts accumulate
//! within a rolling window; crossing the threshold installs a temporary
//! block during which the counter is frozen.
//!
//! The window is anchored to the time since the *last* attempt, not to a
//! fixed bucket: a requester that keeps spacing attempts just under the
//! window length keeps the window perpetually fresh. That anchoring is
//! inherited behavior and deliberately preserved.

use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::{
    Error, RateLimitConfig, RateLimitDecision, repositories::ResetAttemptRepository,
};

/// Service gating reset requests per `(email, ip_address)` key.
///
/// # Thread Safety
///
/// The service is shareable across tasks; counting relies on the
/// repository's atomic increment (see [`ResetAttemptRepository`]), so
/// concurrent checks for the same key never undercount.
pub struct RateLimitService<A: ResetAttemptRepository> {
    attempts: Arc<A>,
    config: RateLimitConfig,
}

impl<A: ResetAttemptRepository> RateLimitService<A> {
    pub fn new(attempts: Arc<A>, config: RateLimitConfig) -> Self {
        Self { attempts, config }
    }

    pub fn config(&self) -> &RateLimitConfig {
        &self.config
    }

    /// Decide whether a reset request for this key may proceed, recording
    /// the attempt.
    ///
    /// - First request for a key creates the counter at 1 and is allowed.
    /// - While a block is active the request is denied and the counter is
    ///   NOT incremented.
    /// - A request arriving after the window has elapsed since the last
    ///   attempt restarts the counter at 1.
    /// - Otherwise the counter is incremented; the request that reaches
    ///   `max_attempts` installs a block of `block_duration` and is denied.
    pub async fn check_rate_limit(
        &self,
        email: &str,
        ip_address: &str,
    ) -> Result<RateLimitDecision, Error> {
        let now = Utc::now();

        let Some(attempt) = self.attempts.find(email, ip_address).await? else {
            self.attempts.create(email, ip_address).await?;
            return Ok(RateLimitDecision::allowed(self.config.max_attempts - 1));
        };

        if let Some(blocked_until) = attempt.blocked_until {
            if blocked_until > now {
                return Ok(RateLimitDecision::blocked(blocked_until, false));
            }
        }

        if now - attempt.last_attempt_at >= self.config.window {
            self.attempts.restart_window(attempt.id).await?;
            return Ok(RateLimitDecision::allowed(self.config.max_attempts - 1));
        }

        let updated = self.attempts.increment(attempt.id).await?;

        if updated.attempt_count >= self.config.max_attempts {
            let blocked_until = now + self.config.block_duration;
            self.attempts.block(updated.id, blocked_until).await?;
            return Ok(RateLimitDecision::blocked(blocked_until, true));
        }

        Ok(RateLimitDecision::allowed(
            self.config.max_attempts - updated.attempt_count,
        ))
    }

    /// Forgive all attempts for a key and lift any block.
    ///
    /// Not invoked by the default flow; available for callers that want to
    /// reward a successful redemption.
    pub async fn clear_attempts(&self, email: &str, ip_address: &str) -> Result<(), Error> {
        self.attempts.clear(email, ip_address).await
    }

    /// Remove attempt rows whose block has lapsed. Returns the count removed.
    pub async fn cleanup_expired_blocks(&self, now: DateTime<Utc>) -> Result<u64, Error> {
        self.attempts.cleanup_lapsed_blocks(now).await
    }

    /// Human-readable refusal for a blocked request.
    pub fn blocked_message(decision: &RateLimitDecision) -> String {
        match decision.minutes_remaining(Utc::now()) {
            Some(minutes) => {
                format!("Too many reset attempts. Try again in {minutes} minute(s).")
            }
            None => "Too many reset attempts. Try again later.".to_string(),
        }
    }

    /// Human-readable warning about the attempts left before a block.
    pub fn remaining_attempts_message(remaining: u32) -> String {
        format!("{remaining} attempt(s) remaining before a temporary block.")
    }
}
