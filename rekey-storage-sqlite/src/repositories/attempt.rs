use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::SqlitePool;

use rekey_core::{
    Error, ResetAttempt, error::StorageError, repositories::ResetAttemptRepository,
};

const ATTEMPT_COLUMNS: &str =
    "id, email, ip_address, attempt_count, last_attempt_at, blocked_until, created_at";

/// SQLite repository for reset-attempt counters.
///
/// Counter updates run as single `UPDATE` statements with in-database
/// arithmetic, so concurrent checks for the same key serialize inside SQLite
/// and never undercount.
pub struct SqliteAttemptRepository {
    pool: SqlitePool,
}

impl SqliteAttemptRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

/// Internal struct for query results
#[derive(Debug, sqlx::FromRow)]
struct SqliteResetAttempt {
    id: i64,
    email: String,
    ip_address: String,
    attempt_count: i64,
    last_attempt_at: i64,
    blocked_until: Option<i64>,
    created_at: i64,
}

impl From<SqliteResetAttempt> for ResetAttempt {
    fn from(row: SqliteResetAttempt) -> Self {
        ResetAttempt {
            id: row.id,
            email: row.email,
            ip_address: row.ip_address,
            attempt_count: row.attempt_count as u32,
            last_attempt_at: DateTime::from_timestamp(row.last_attempt_at, 0)
                .expect("Invalid timestamp"),
            blocked_until: row
                .blocked_until
                .map(|ts| DateTime::from_timestamp(ts, 0).expect("Invalid timestamp")),
            created_at: DateTime::from_timestamp(row.created_at, 0).expect("Invalid timestamp"),
        }
    }
}

#[async_trait]
impl ResetAttemptRepository for SqliteAttemptRepository {
    async fn find(&self, email: &str, ip_address: &str) -> Result<Option<ResetAttempt>, Error> {
        let row = sqlx::query_as::<_, SqliteResetAttempt>(&format!(
            "SELECT {ATTEMPT_COLUMNS} FROM password_reset_attempts WHERE email = ?1 AND ip_address = ?2"
        ))
        .bind(email)
        .bind(ip_address)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| Error::Storage(StorageError::Database(e.to_string())))?;

        Ok(row.map(|a| a.into()))
    }

    async fn create(&self, email: &str, ip_address: &str) -> Result<ResetAttempt, Error> {
        let now = Utc::now().timestamp();

        // Two concurrent first requests for the same key both miss on find
        // and both land here; the conflict arm turns the loser into an
        // ordinary counted attempt instead of a unique-constraint failure.
        let row = sqlx::query_as::<_, SqliteResetAttempt>(&format!(
            r#"
            INSERT INTO password_reset_attempts (email, ip_address, attempt_count, last_attempt_at, created_at)
            VALUES (?1, ?2, 1, ?3, ?3)
            ON CONFLICT (email, ip_address) DO UPDATE
            SET attempt_count = attempt_count + 1, last_attempt_at = excluded.last_attempt_at
            RETURNING {ATTEMPT_COLUMNS}
            "#
        ))
        .bind(email)
        .bind(ip_address)
        .bind(now)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            tracing::error!(error = %e, "Failed to create reset attempt");
            Error::Storage(StorageError::Database(
                "Failed to create reset attempt".to_string(),
            ))
        })?;

        Ok(row.into())
    }

    async fn increment(&self, id: i64) -> Result<ResetAttempt, Error> {
        let now = Utc::now().timestamp();

        let row = sqlx::query_as::<_, SqliteResetAttempt>(&format!(
            r#"
            UPDATE password_reset_attempts
            SET attempt_count = attempt_count + 1, last_attempt_at = ?1
            WHERE id = ?2
            RETURNING {ATTEMPT_COLUMNS}
            "#
        ))
        .bind(now)
        .bind(id)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| Error::Storage(StorageError::Database(e.to_string())))?;

        Ok(row.into())
    }

    async fn restart_window(&self, id: i64) -> Result<(), Error> {
        let now = Utc::now().timestamp();

        sqlx::query(
            r#"
            UPDATE password_reset_attempts
            SET attempt_count = 1, last_attempt_at = ?1, blocked_until = NULL
            WHERE id = ?2
            "#,
        )
        .bind(now)
        .bind(id)
        .execute(&self.pool)
        .await
        .map_err(|e| Error::Storage(StorageError::Database(e.to_string())))?;

        Ok(())
    }

    async fn block(&self, id: i64, until: DateTime<Utc>) -> Result<(), Error> {
        sqlx::query("UPDATE password_reset_attempts SET blocked_until = ?1 WHERE id = ?2")
            .bind(until.timestamp())
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(|e| Error::Storage(StorageError::Database(e.to_string())))?;

        Ok(())
    }

    async fn clear(&self, email: &str, ip_address: &str) -> Result<(), Error> {
        sqlx::query("DELETE FROM password_reset_attempts WHERE email = ?1 AND ip_address = ?2")
            .bind(email)
            .bind(ip_address)
            .execute(&self.pool)
            .await
            .map_err(|e| Error::Storage(StorageError::Database(e.to_string())))?;

        Ok(())
    }

    async fn cleanup_stale(&self, before: DateTime<Utc>) -> Result<u64, Error> {
        let result = sqlx::query("DELETE FROM password_reset_attempts WHERE last_attempt_at < ?1")
            .bind(before.timestamp())
            .execute(&self.pool)
            .await
            .map_err(|e| Error::Storage(StorageError::Database(e.to_string())))?;

        Ok(result.rows_affected())
    }

    async fn cleanup_lapsed_blocks(&self, now: DateTime<Utc>) -> Result<u64, Error> {
        let result = sqlx::query(
            "DELETE FROM password_reset_attempts WHERE blocked_until IS NOT NULL AND blocked_until < ?1",
        )
        .bind(now.timestamp())
        .execute(&self.pool)
        .await
        .map_err(|e| Error::Storage(StorageError::Database(e.to_string())))?;

        Ok(result.rows_affected())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::SqliteRepositoryProvider;
    use chrono::Duration;
    use rekey_core::repositories::RepositoryProvider;

    async fn repository() -> SqliteAttemptRepository {
        let _ = tracing_subscriber::fmt::try_init();
        let pool = SqlitePool::connect("sqlite::memory:").await.unwrap();
        SqliteRepositoryProvider::new(pool.clone())
            .migrate()
            .await
            .unwrap();
        SqliteAttemptRepository::new(pool)
    }

    #[tokio::test]
    async fn test_create_and_find_attempt() {
        let repo = repository().await;

        let created = repo.create("a@b.com", "1.2.3.4").await.unwrap();
        assert_eq!(created.attempt_count, 1);
        assert!(created.blocked_until.is_none());

        let found = repo.find("a@b.com", "1.2.3.4").await.unwrap().unwrap();
        assert_eq!(found.id, created.id);

        // Key is the (email, ip) pair
        assert!(repo.find("a@b.com", "5.6.7.8").await.unwrap().is_none());
        assert!(repo.find("c@d.com", "1.2.3.4").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_racing_creates_count_instead_of_failing() {
        let repo = repository().await;
        let first = repo.create("a@b.com", "1.2.3.4").await.unwrap();
        assert_eq!(first.attempt_count, 1);

        // A second create for the same key (lost find/create race) lands on
        // the existing row as a counted attempt.
        let second = repo.create("a@b.com", "1.2.3.4").await.unwrap();
        assert_eq!(second.id, first.id);
        assert_eq!(second.attempt_count, 2);
        assert!(second.last_attempt_at >= first.last_attempt_at);
    }

    #[tokio::test]
    async fn test_increment_advances_counter_and_timestamp() {
        let repo = repository().await;
        let created = repo.create("a@b.com", "1.2.3.4").await.unwrap();

        let updated = repo.increment(created.id).await.unwrap();
        assert_eq!(updated.attempt_count, 2);
        assert!(updated.last_attempt_at >= created.last_attempt_at);

        let updated = repo.increment(created.id).await.unwrap();
        assert_eq!(updated.attempt_count, 3);
    }

    #[tokio::test]
    async fn test_block_and_restart_window() {
        let repo = repository().await;
        let created = repo.create("a@b.com", "1.2.3.4").await.unwrap();
        let until = Utc::now() + Duration::minutes(30);

        repo.block(created.id, until).await.unwrap();
        let row = repo.find("a@b.com", "1.2.3.4").await.unwrap().unwrap();
        assert_eq!(row.blocked_until.map(|t| t.timestamp()), Some(until.timestamp()));

        repo.restart_window(created.id).await.unwrap();
        let row = repo.find("a@b.com", "1.2.3.4").await.unwrap().unwrap();
        assert_eq!(row.attempt_count, 1);
        assert!(row.blocked_until.is_none());
    }

    #[tokio::test]
    async fn test_clear_removes_row() {
        let repo = repository().await;
        repo.create("a@b.com", "1.2.3.4").await.unwrap();

        repo.clear("a@b.com", "1.2.3.4").await.unwrap();
        assert!(repo.find("a@b.com", "1.2.3.4").await.unwrap().is_none());

        // Clearing an absent key is a no-op
        repo.clear("a@b.com", "1.2.3.4").await.unwrap();
    }

    #[tokio::test]
    async fn test_cleanup_stale_and_lapsed_blocks() {
        let repo = repository().await;
        let stale = repo.create("stale@b.com", "1.2.3.4").await.unwrap();
        let blocked = repo.create("blocked@b.com", "1.2.3.4").await.unwrap();
        repo.create("live@b.com", "1.2.3.4").await.unwrap();

        sqlx::query("UPDATE password_reset_attempts SET last_attempt_at = ?1 WHERE id = ?2")
            .bind((Utc::now() - Duration::hours(25)).timestamp())
            .bind(stale.id)
            .execute(&repo.pool)
            .await
            .unwrap();
        repo.block(blocked.id, Utc::now() - Duration::minutes(1))
            .await
            .unwrap();

        let removed = repo
            .cleanup_stale(Utc::now() - Duration::hours(24))
            .await
            .unwrap();
        assert_eq!(removed, 1);

        let removed = repo.cleanup_lapsed_blocks(Utc::now()).await.unwrap();
        assert_eq!(removed, 1);

        assert!(repo.find("live@b.com", "1.2.3.4").await.unwrap().is_some());
        assert!(repo.find("stale@b.com", "1.2.3.4").await.unwrap().is_none());
        assert!(repo.find("blocked@b.com", "1.2.3.4").await.unwrap().is_none());
    }
}
