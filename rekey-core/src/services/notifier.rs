use async_trait::async_trait;

use crate::Error;

/// Out-of-band delivery seam for reset links.
///
/// Implementations deliver the token to the address holder (email, SMS,
/// support tooling). The reset service treats delivery as best-effort: an
/// `Err` from here is logged and swallowed, never surfaced to the requester,
/// so that delivery-channel failures cannot be probed from the outside.
#[async_trait]
pub trait ResetNotifier: Send + Sync {
    /// Deliver a reset token to `to`, optionally addressing the recipient by
    /// display name.
    async fn send_password_reset_email(
        &self,
        to: &str,
        token: &str,
        user_name: Option<&str>,
    ) -> Result<(), Error>;
}
