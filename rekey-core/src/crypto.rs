//! Cryptographic utilities for reset token generation
//!
//! Reset tokens are bearer credentials: whoever presents one can change the
//! owning account's password. They are therefore drawn from the OS CSPRNG
//! with 256 bits of entropy, enough that guessing is infeasible within any
//! realistic expiry window.

use rand::{TryRngCore, rngs::OsRng};

/// Number of random bytes in a reset token (256 bits).
pub const RESET_TOKEN_BYTES: usize = 32;

/// Generate a cryptographically secure password-reset token.
///
/// Produces 32 bytes of OS randomness, hex-encoded to a 64-character string.
/// The hex form is the wire format: it is what gets embedded in the reset
/// link and used as the storage lookup key.
///
/// # Panics
///
/// Panics if the OS random number generator fails. This indicates a critical
/// system failure (e.g., /dev/urandom unavailable) from which recovery is not
/// possible for security-sensitive operations.
pub fn generate_reset_token() -> String {
    let mut bytes = [0u8; RESET_TOKEN_BYTES];
    OsRng
        .try_fill_bytes(&mut bytes)
        .expect("OS RNG failure - system entropy source unavailable");
    hex::encode(bytes)
}
