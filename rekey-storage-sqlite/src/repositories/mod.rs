//! Repository implementations for SQLite storage

pub mod attempt;
pub mod token;
pub mod user;

pub use attempt::SqliteAttemptRepository;
pub use token::SqliteTokenRepository;
pub use user::SqliteUserRepository;

use async_trait::async_trait;
use sqlx::SqlitePool;
use std::sync::Arc;

use rekey_core::{
    Error,
    error::StorageError,
    repositories::{
        AttemptRepositoryProvider, RepositoryProvider, TokenRepositoryProvider,
        UserRepositoryProvider,
    },
};

/// Schema for the password-reset subsystem, applied in order.
///
/// Statements are idempotent so `migrate` can run on every startup. The user
/// table carries only the columns this subsystem reads and writes; a host
/// application with its own user table can point the repositories at a
/// compatible view instead.
const MIGRATIONS: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS users (
        id TEXT PRIMARY KEY,
        email TEXT NOT NULL UNIQUE,
        name TEXT,
        password_hash TEXT,
        created_at INTEGER NOT NULL,
        updated_at INTEGER NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS password_reset_tokens (
        id TEXT PRIMARY KEY,
        user_id TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
        token TEXT NOT NULL UNIQUE,
        expires_at INTEGER NOT NULL,
        used INTEGER NOT NULL DEFAULT 0,
        created_at INTEGER NOT NULL
    )
    "#,
    r#"
    CREATE INDEX IF NOT EXISTS idx_password_reset_tokens_created_at
        ON password_reset_tokens (created_at)
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS password_reset_attempts (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        email TEXT NOT NULL,
        ip_address TEXT NOT NULL,
        attempt_count INTEGER NOT NULL DEFAULT 1,
        last_attempt_at INTEGER NOT NULL,
        blocked_until INTEGER,
        created_at INTEGER NOT NULL,
        UNIQUE (email, ip_address)
    )
    "#,
    r#"
    CREATE INDEX IF NOT EXISTS idx_password_reset_attempts_last_attempt_at
        ON password_reset_attempts (last_attempt_at)
    "#,
];

/// Repository provider implementation for SQLite
///
/// This struct implements all the individual repository provider traits
/// as well as the unified `RepositoryProvider` trait.
pub struct SqliteRepositoryProvider {
    pool: SqlitePool,
    user: Arc<SqliteUserRepository>,
    token: Arc<SqliteTokenRepository>,
    attempt: Arc<SqliteAttemptRepository>,
}

impl SqliteRepositoryProvider {
    pub fn new(pool: SqlitePool) -> Self {
        let user = Arc::new(SqliteUserRepository::new(pool.clone()));
        let token = Arc::new(SqliteTokenRepository::new(pool.clone()));
        let attempt = Arc::new(SqliteAttemptRepository::new(pool.clone()));

        Self {
            pool,
            user,
            token,
            attempt,
        }
    }
}

// Implement individual provider traits

impl UserRepositoryProvider for SqliteRepositoryProvider {
    type UserRepo = SqliteUserRepository;

    fn user(&self) -> &Self::UserRepo {
        &self.user
    }
}

impl TokenRepositoryProvider for SqliteRepositoryProvider {
    type TokenRepo = SqliteTokenRepository;

    fn token(&self) -> &Self::TokenRepo {
        &self.token
    }
}

impl AttemptRepositoryProvider for SqliteRepositoryProvider {
    type AttemptRepo = SqliteAttemptRepository;

    fn attempt(&self) -> &Self::AttemptRepo {
        &self.attempt
    }
}

// Implement the unified RepositoryProvider trait

#[async_trait]
impl RepositoryProvider for SqliteRepositoryProvider {
    async fn migrate(&self) -> Result<(), Error> {
        for statement in MIGRATIONS {
            sqlx::query(statement)
                .execute(&self.pool)
                .await
                .map_err(|e| {
                    tracing::error!(error = %e, "Failed to run migrations");
                    Error::Storage(StorageError::Migration(
                        "Failed to run migrations".to_string(),
                    ))
                })?;
        }
        Ok(())
    }

    async fn health_check(&self) -> Result<(), Error> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(|e| Error::Storage(StorageError::Database(e.to_string())))?;
        Ok(())
    }
}
