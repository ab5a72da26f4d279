//! User read model
//!
//! The user record store is an external collaborator: this subsystem looks
//! users up by email or id and writes a new password hash, nothing more.
//! Account creation, profile management, and login live elsewhere.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::id::{generate_prefixed_id, validate_prefixed_id};

/// A unique, stable identifier for a specific user.
///
/// This value should be treated as opaque, even when it happens to look like
/// a recognizable format.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Hash)]
pub struct UserId(String);

impl UserId {
    pub fn new(id: &str) -> Self {
        UserId(id.to_string())
    }

    pub fn new_random() -> Self {
        UserId(generate_prefixed_id("usr"))
    }

    pub fn into_inner(self) -> String {
        self.0
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Validate that this ID has the correct format for a user ID
    pub fn is_valid(&self) -> bool {
        validate_prefixed_id(&self.0, "usr")
    }
}

impl Default for UserId {
    fn default() -> Self {
        Self::new_random()
    }
}

impl From<String> for UserId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for UserId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl std::fmt::Display for UserId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The subset of the user record this subsystem reads.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    /// The unique identifier for the user.
    pub id: UserId,

    /// The email of the user.
    pub email: String,

    /// The display name of the user, if known. Used to address reset emails.
    pub name: Option<String>,

    /// The timestamp when the user was created.
    pub created_at: DateTime<Utc>,

    /// The timestamp when the user was last updated.
    pub updated_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_user_id_roundtrip() {
        let id = UserId::new("usr_abc123");
        assert_eq!(id.as_str(), "usr_abc123");
        assert_eq!(id.to_string(), "usr_abc123");
        assert_eq!(id.clone().into_inner(), "usr_abc123");
    }

    #[test]
    fn test_random_user_id_is_valid() {
        let id = UserId::new_random();
        assert!(id.is_valid());
        assert!(id.as_str().starts_with("usr_"));
    }
}
