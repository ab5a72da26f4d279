use std::sync::Arc;

use chrono::{Duration, Utc};
use rekey::{ClientContext, RateLimitConfig, RekeyBuilder, SqliteRepositoryProvider};
use rekey_storage_sqlite::SqliteUserRepository;
use sqlx::SqlitePool;

#[tokio::test]
async fn test_build_with_sqlite_url_and_migrations() {
    let rekey = RekeyBuilder::new()
        .with_sqlite("sqlite::memory:")
        .await
        .unwrap()
        .apply_migrations(true)
        .build()
        .await
        .unwrap();

    rekey.health_check().await.unwrap();

    // Unknown email still gets the uniform acceptance
    let outcome = rekey
        .request_password_reset("nobody@example.com", &ClientContext::new("203.0.113.7"))
        .await
        .unwrap();
    assert!(outcome.success());
}

#[tokio::test]
async fn test_build_without_migrations_requires_manual_migrate() {
    let rekey = RekeyBuilder::new()
        .with_sqlite("sqlite::memory:")
        .await
        .unwrap()
        .build()
        .await
        .unwrap();

    // Schema absent until migrate is called
    let result = rekey
        .request_password_reset("nobody@example.com", &ClientContext::new("203.0.113.7"))
        .await;
    assert!(result.is_err());

    rekey.migrate().await.unwrap();
    let outcome = rekey
        .request_password_reset("nobody@example.com", &ClientContext::new("203.0.113.7"))
        .await
        .unwrap();
    assert!(outcome.success());
}

#[tokio::test]
async fn test_custom_rate_limit_config() {
    let pool = SqlitePool::connect("sqlite::memory:").await.unwrap();
    let rekey = RekeyBuilder::new()
        .with_repositories(Arc::new(SqliteRepositoryProvider::new(pool.clone())))
        .with_rate_limit_config(RateLimitConfig {
            max_attempts: 2,
            ..RateLimitConfig::default()
        })
        .apply_migrations(true)
        .build()
        .await
        .unwrap();

    let client = ClientContext::new("203.0.113.7");
    assert!(
        rekey
            .request_password_reset("a@b.com", &client)
            .await
            .unwrap()
            .success()
    );
    assert!(
        !rekey
            .request_password_reset("a@b.com", &client)
            .await
            .unwrap()
            .success()
    );
}

#[tokio::test]
async fn test_custom_token_ttl() {
    let pool = SqlitePool::connect("sqlite::memory:").await.unwrap();
    let rekey = RekeyBuilder::new()
        .with_repositories(Arc::new(SqliteRepositoryProvider::new(pool.clone())))
        .with_token_ttl(Duration::minutes(60))
        .apply_migrations(true)
        .build()
        .await
        .unwrap();

    SqliteUserRepository::new(pool.clone())
        .create("alice@example.com", None)
        .await
        .unwrap();

    let before = Utc::now();
    rekey
        .request_password_reset("alice@example.com", &ClientContext::new("203.0.113.7"))
        .await
        .unwrap();

    let expires_at = sqlx::query_scalar::<_, i64>("SELECT expires_at FROM password_reset_tokens")
        .fetch_one(&pool)
        .await
        .unwrap();
    let expected = (before + Duration::minutes(60)).timestamp();
    assert!((expires_at - expected).abs() <= 1);
}
