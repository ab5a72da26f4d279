use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::SqlitePool;

use rekey_core::{
    Error, NewResetToken, ResetToken, UserId, error::StorageError, id::generate_prefixed_id,
    repositories::ResetTokenRepository,
};

/// SQLite repository for password-reset tokens.
pub struct SqliteTokenRepository {
    pool: SqlitePool,
}

impl SqliteTokenRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

/// Internal struct for query results
#[derive(Debug, sqlx::FromRow)]
struct SqliteResetToken {
    id: String,
    user_id: String,
    token: String,
    expires_at: i64,
    used: bool,
    created_at: i64,
}

impl From<SqliteResetToken> for ResetToken {
    fn from(row: SqliteResetToken) -> Self {
        ResetToken {
            id: row.id,
            user_id: UserId::new(&row.user_id),
            token: row.token,
            expires_at: DateTime::from_timestamp(row.expires_at, 0).expect("Invalid timestamp"),
            used: row.used,
            created_at: DateTime::from_timestamp(row.created_at, 0).expect("Invalid timestamp"),
        }
    }
}

#[async_trait]
impl ResetTokenRepository for SqliteTokenRepository {
    async fn create_token(&self, new_token: NewResetToken) -> Result<ResetToken, Error> {
        let id = generate_prefixed_id("prt");
        let now = Utc::now().timestamp();

        let row = sqlx::query_as::<_, SqliteResetToken>(
            r#"
            INSERT INTO password_reset_tokens (id, user_id, token, expires_at, used, created_at)
            VALUES (?1, ?2, ?3, ?4, 0, ?5)
            RETURNING id, user_id, token, expires_at, used, created_at
            "#,
        )
        .bind(&id)
        .bind(new_token.user_id.as_str())
        .bind(&new_token.token)
        .bind(new_token.expires_at.timestamp())
        .bind(now)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            tracing::error!(error = %e, "Failed to create reset token");
            Error::Storage(StorageError::Database(
                "Failed to create reset token".to_string(),
            ))
        })?;

        Ok(row.into())
    }

    async fn find_by_token(&self, token: &str) -> Result<Option<ResetToken>, Error> {
        let row = sqlx::query_as::<_, SqliteResetToken>(
            r#"
            SELECT id, user_id, token, expires_at, used, created_at
            FROM password_reset_tokens
            WHERE token = ?1
            "#,
        )
        .bind(token)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| Error::Storage(StorageError::Database(e.to_string())))?;

        Ok(row.map(|t| t.into()))
    }

    async fn mark_used(&self, id: &str) -> Result<bool, Error> {
        // Conditional update is the linearization point for redemption: of
        // two concurrent calls, exactly one sees an affected row.
        let result = sqlx::query(
            "UPDATE password_reset_tokens SET used = 1 WHERE id = ?1 AND used = 0",
        )
        .bind(id)
        .execute(&self.pool)
        .await
        .map_err(|e| Error::Storage(StorageError::Database(e.to_string())))?;

        Ok(result.rows_affected() > 0)
    }

    async fn cleanup_expired(&self, before: DateTime<Utc>) -> Result<u64, Error> {
        let result = sqlx::query("DELETE FROM password_reset_tokens WHERE created_at < ?1")
            .bind(before.timestamp())
            .execute(&self.pool)
            .await
            .map_err(|e| Error::Storage(StorageError::Database(e.to_string())))?;

        Ok(result.rows_affected())
    }
}
