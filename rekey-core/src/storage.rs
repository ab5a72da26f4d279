//! Domain rows and value types shared between services and repositories.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::UserId;

/// A single-use, time-limited password-reset credential.
///
/// Lifecycle: `ISSUED -> (REDEEMED | EXPIRED)`. `REDEEMED` is terminal and
/// recorded via the `used` flag; `EXPIRED` is never written, it is computed
/// at read time by comparing `expires_at` to the current time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResetToken {
    /// Opaque identifier for the row (`prt_…`).
    pub id: String,

    /// The user this token belongs to.
    pub user_id: UserId,

    /// High-entropy token string (64 hex characters), unique, used as the
    /// lookup key.
    pub token: String,

    /// The moment the token stops being redeemable.
    pub expires_at: DateTime<Utc>,

    /// Set exactly once, on successful redemption.
    pub used: bool,

    pub created_at: DateTime<Utc>,
}

impl ResetToken {
    /// A token at exactly `expires_at` is already expired.
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at <= now
    }

    /// A token can be redeemed iff it is unused and unexpired.
    pub fn is_usable(&self, now: DateTime<Utc>) -> bool {
        !self.used && !self.is_expired(now)
    }
}

/// Input for creating a reset token; the repository assigns the id.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewResetToken {
    pub user_id: UserId,
    pub token: String,
    pub expires_at: DateTime<Utc>,
}

impl NewResetToken {
    pub fn new(user_id: UserId, token: String, expires_at: DateTime<Utc>) -> Self {
        Self {
            user_id,
            token,
            expires_at,
        }
    }
}

/// Per-`(email, ip_address)` reset-request counter with an optional block.
///
/// One row exists per key. The counter accumulates within a rolling window
/// anchored to `last_attempt_at` and resets when a request arrives after the
/// window has fully elapsed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResetAttempt {
    pub id: i64,
    pub email: String,
    pub ip_address: String,
    pub attempt_count: u32,
    pub last_attempt_at: DateTime<Utc>,

    /// When set and in the future, all requests for this key are rejected
    /// regardless of count.
    pub blocked_until: Option<DateTime<Utc>>,

    pub created_at: DateTime<Utc>,
}

impl ResetAttempt {
    pub fn is_blocked(&self, now: DateTime<Utc>) -> bool {
        self.blocked_until.is_some_and(|until| until > now)
    }
}

/// Configuration for the reset-request rate limiter.
#[derive(Debug, Clone, Copy)]
pub struct RateLimitConfig {
    /// Attempts allowed within the window; the request that reaches this
    /// count is the one that triggers the block.
    pub max_attempts: u32,

    /// Rolling window, anchored to the most recent attempt.
    pub window: Duration,

    /// How long a triggered block lasts.
    pub block_duration: Duration,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            window: Duration::minutes(15),
            block_duration: Duration::minutes(30),
        }
    }
}

/// Result of a rate-limit check for one request.
#[derive(Debug, Clone, PartialEq)]
pub struct RateLimitDecision {
    pub allowed: bool,

    /// Attempts left before a block, when the request was allowed.
    pub remaining_attempts: Option<u32>,

    /// When the current block lapses, when the request was denied.
    pub blocked_until: Option<DateTime<Utc>>,

    /// True only for the request that created the block, so callers can
    /// audit the threshold crossing exactly once.
    pub newly_blocked: bool,
}

impl RateLimitDecision {
    pub fn allowed(remaining_attempts: u32) -> Self {
        Self {
            allowed: true,
            remaining_attempts: Some(remaining_attempts),
            blocked_until: None,
            newly_blocked: false,
        }
    }

    pub fn blocked(blocked_until: DateTime<Utc>, newly_blocked: bool) -> Self {
        Self {
            allowed: false,
            remaining_attempts: None,
            blocked_until: Some(blocked_until),
            newly_blocked,
        }
    }

    /// Whole minutes until the block lapses, rounded up, never below 1.
    /// `None` if the decision carries no block.
    pub fn minutes_remaining(&self, now: DateTime<Utc>) -> Option<i64> {
        self.blocked_until.map(|until| {
            let seconds = (until - now).num_seconds();
            std::cmp::max(1, (seconds + 59) / 60)
        })
    }
}

/// Per-category counts from one cleanup pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CleanupReport {
    pub tokens: u64,
    pub attempts: u64,
    pub blocks: u64,
}

impl CleanupReport {
    pub fn is_empty(&self) -> bool {
        self.tokens == 0 && self.attempts == 0 && self.blocks == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_token_expiry_boundary() {
        let now = Utc::now();
        let token = ResetToken {
            id: "prt_test".to_string(),
            user_id: UserId::new("usr_test"),
            token: "ab".repeat(32),
            expires_at: now,
            used: false,
            created_at: now - Duration::minutes(15),
        };

        // expires_at == now counts as expired, no ambiguity window
        assert!(token.is_expired(now));
        assert!(!token.is_usable(now));
        assert!(!token.is_expired(now - Duration::seconds(1)));
        assert!(token.is_usable(now - Duration::seconds(1)));
    }

    #[test]
    fn test_used_token_is_not_usable() {
        let now = Utc::now();
        let token = ResetToken {
            id: "prt_test".to_string(),
            user_id: UserId::new("usr_test"),
            token: "ab".repeat(32),
            expires_at: now + Duration::minutes(15),
            used: true,
            created_at: now,
        };

        assert!(!token.is_usable(now));
        assert!(!token.is_expired(now));
    }

    #[test]
    fn test_attempt_block_state() {
        let now = Utc::now();
        let mut attempt = ResetAttempt {
            id: 1,
            email: "a@b.com".to_string(),
            ip_address: "1.2.3.4".to_string(),
            attempt_count: 5,
            last_attempt_at: now,
            blocked_until: Some(now + Duration::minutes(30)),
            created_at: now,
        };

        assert!(attempt.is_blocked(now));

        attempt.blocked_until = Some(now - Duration::seconds(1));
        assert!(!attempt.is_blocked(now));

        attempt.blocked_until = None;
        assert!(!attempt.is_blocked(now));
    }

    #[test]
    fn test_minutes_remaining_rounds_up() {
        let now = Utc::now();

        let decision = RateLimitDecision::blocked(now + Duration::seconds(61), true);
        assert_eq!(decision.minutes_remaining(now), Some(2));

        let decision = RateLimitDecision::blocked(now + Duration::seconds(5), false);
        assert_eq!(decision.minutes_remaining(now), Some(1));

        let decision = RateLimitDecision::allowed(4);
        assert_eq!(decision.minutes_remaining(now), None);
    }

    #[test]
    fn test_default_rate_limit_config() {
        let config = RateLimitConfig::default();
        assert_eq!(config.max_attempts, 5);
        assert_eq!(config.window, Duration::minutes(15));
        assert_eq!(config.block_duration, Duration::minutes(30));
    }
}
