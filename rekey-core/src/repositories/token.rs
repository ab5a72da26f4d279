use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::{Error, NewResetToken, ResetToken};

/// Repository for password-reset token data.
///
/// # Concurrency contract
///
/// [`mark_used`](ResetTokenRepository::mark_used) is the redemption
/// linearization point: it must be a storage-level conditional update
/// (`UPDATE … WHERE used = false` with an affected-row check, or an
/// equivalent compare-and-set), never a read followed by a blind write. Two
/// concurrent redemptions of the same token must observe exactly one `true`.
#[async_trait]
pub trait ResetTokenRepository: Send + Sync + 'static {
    /// Persist a new reset token. The repository assigns the row id.
    async fn create_token(&self, new_token: NewResetToken) -> Result<ResetToken, Error>;

    /// Look a token up by its token string.
    ///
    /// Returns the row regardless of used/expired state; callers classify.
    async fn find_by_token(&self, token: &str) -> Result<Option<ResetToken>, Error>;

    /// Atomically flip the `used` flag for a token that has not been used.
    ///
    /// Returns `true` iff this call performed the unused-to-used transition.
    /// A `false` return means another caller consumed the token first.
    async fn mark_used(&self, id: &str) -> Result<bool, Error>;

    /// Delete tokens created before the given cutoff, used or not.
    ///
    /// Callers pass a cutoff at least one full expiry window in the past, so
    /// every purged token is also expired. Returns the number removed.
    async fn cleanup_expired(&self, before: DateTime<Utc>) -> Result<u64, Error>;
}
