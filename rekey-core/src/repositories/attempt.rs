use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::{Error, ResetAttempt};

/// Repository for per-`(email, ip_address)` reset-attempt counters.
///
/// # Concurrency contract
///
/// [`increment`](ResetAttemptRepository::increment) must be an atomic
/// storage-level `count = count + 1` (with the updated row read back), never
/// a read-modify-write in the caller. Concurrent requests for the same key
/// race on this counter, and an increment implemented as read-then-write
/// undercounts, letting an attacker slip under the block threshold. This is
/// a required invariant of the trait, not an implementation detail.
#[async_trait]
pub trait ResetAttemptRepository: Send + Sync + 'static {
    /// Find the attempt row for a key, if any.
    async fn find(&self, email: &str, ip_address: &str) -> Result<Option<ResetAttempt>, Error>;

    /// Create the row for a key with `attempt_count = 1` and
    /// `last_attempt_at = now`. The creation itself records the first attempt.
    ///
    /// Implementations must tolerate losing a find/create race: if the row
    /// already exists, count the attempt (as [`increment`] would) rather than
    /// fail.
    ///
    /// [`increment`]: ResetAttemptRepository::increment
    async fn create(&self, email: &str, ip_address: &str) -> Result<ResetAttempt, Error>;

    /// Atomically increment the counter and refresh `last_attempt_at`,
    /// returning the updated row.
    async fn increment(&self, id: i64) -> Result<ResetAttempt, Error>;

    /// Begin a fresh window: `attempt_count = 1`, block cleared,
    /// `last_attempt_at = now`.
    async fn restart_window(&self, id: i64) -> Result<(), Error>;

    /// Set `blocked_until` for a row.
    async fn block(&self, id: i64, until: DateTime<Utc>) -> Result<(), Error>;

    /// Forgive a key: reset the counter and lift any block. Resetting the
    /// count and deleting the row are both acceptable. No-op for unknown keys.
    async fn clear(&self, email: &str, ip_address: &str) -> Result<(), Error>;

    /// Delete rows whose `last_attempt_at` is before the cutoff. Returns the
    /// number removed.
    async fn cleanup_stale(&self, before: DateTime<Utc>) -> Result<u64, Error>;

    /// Delete rows whose block has lapsed (`blocked_until` set and in the
    /// past). Returns the number removed.
    async fn cleanup_lapsed_blocks(&self, now: DateTime<Utc>) -> Result<u64, Error>;
}
