use async_trait::async_trait;

use crate::{Error, User, UserId};

/// Repository for the external user record store.
///
/// This is deliberately the narrowest surface the reset flow needs: lookup by
/// email (request), lookup by id (redemption), and replacing the stored
/// password hash. Nothing here can create or enumerate accounts.
#[async_trait]
pub trait UserRepository: Send + Sync + 'static {
    /// Find a user by id.
    async fn find_by_id(&self, id: &UserId) -> Result<Option<User>, Error>;

    /// Find a user by email address.
    async fn find_by_email(&self, email: &str) -> Result<Option<User>, Error>;

    /// Replace the user's stored password hash.
    ///
    /// The hash is produced by the caller (argon2); implementations store it
    /// verbatim.
    async fn set_password_hash(&self, user_id: &UserId, hash: &str) -> Result<(), Error>;
}
