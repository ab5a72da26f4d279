//! SQLite storage backend for the rekey password-reset subsystem.
//!
//! Provides [`SqliteRepositoryProvider`], which owns a connection pool and
//! implements the repository provider traits from `rekey-core`. Timestamps
//! are stored as unix seconds in `INTEGER` columns; row structs local to
//! each repository handle the conversion.

pub mod repositories;

pub use repositories::{
    SqliteAttemptRepository, SqliteRepositoryProvider, SqliteTokenRepository,
    SqliteUserRepository,
};

use rekey_core::{Error, error::StorageError};
use sqlx::{Pool, Sqlite, SqlitePool};

/// Open a SQLite pool for the given connection URL.
///
/// Use `sqlite::memory:` for an in-memory database or
/// `sqlite:///path/to/db.sqlite?mode=rwc` for a file-backed one.
pub async fn connect(url: &str) -> Result<Pool<Sqlite>, Error> {
    SqlitePool::connect(url).await.map_err(|e| {
        tracing::error!(error = %e, "Failed to connect to SQLite database");
        Error::Storage(StorageError::Connection(e.to_string()))
    })
}
