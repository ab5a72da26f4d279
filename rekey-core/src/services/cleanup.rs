//! Background cleanup of expired security data.
//!
//! A single tokio task sweeps the token and attempt tables on a fixed
//! interval. Retention is deliberately generous: tokens live a full hour
//! past creation (four times their 15-minute validity) and attempt counters
//! a full day past their last activity, so rows stay inspectable for a while
//! after they stop mattering.

use std::sync::{Arc, Mutex};
use std::time::Duration as StdDuration;

use chrono::{Duration, Utc};
use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::{
    CleanupReport, Error,
    repositories::{ResetAttemptRepository, ResetTokenRepository},
};

/// Time between sweeps.
pub const CLEANUP_INTERVAL: StdDuration = StdDuration::from_secs(60 * 60);

/// How long a token row is retained after creation.
pub const TOKEN_RETENTION: Duration = Duration::hours(1);

/// How long an attempt row is retained after its last activity.
pub const ATTEMPT_RETENTION: Duration = Duration::hours(24);

struct RunningCleanup {
    shutdown: watch::Sender<bool>,
    handle: JoinHandle<()>,
}

/// Periodic sweeper for expired tokens, stale attempt counters, and lapsed
/// blocks.
///
/// [`start`](CleanupService::start) spawns the background task (the first
/// sweep runs immediately) and [`stop`](CleanupService::stop) shuts it down.
/// Both are idempotent. [`run_once`](CleanupService::run_once) runs a single
/// sweep inline for callers that manage their own scheduling.
pub struct CleanupService<T, A>
where
    T: ResetTokenRepository,
    A: ResetAttemptRepository,
{
    tokens: Arc<T>,
    attempts: Arc<A>,
    interval: StdDuration,
    runner: Mutex<Option<RunningCleanup>>,
}

impl<T, A> CleanupService<T, A>
where
    T: ResetTokenRepository,
    A: ResetAttemptRepository,
{
    pub fn new(tokens: Arc<T>, attempts: Arc<A>) -> Self {
        Self {
            tokens,
            attempts,
            interval: CLEANUP_INTERVAL,
            runner: Mutex::new(None),
        }
    }

    /// Override the default one-hour sweep interval.
    pub fn with_interval(mut self, interval: StdDuration) -> Self {
        self.interval = interval;
        self
    }

    /// Spawn the background sweep task.
    ///
    /// Returns `false` without spawning if a task is already running. The
    /// first sweep runs as soon as the task starts.
    pub fn start(&self) -> bool {
        let mut runner = self.lock_runner();
        if runner.is_some() {
            tracing::warn!("cleanup task already running; start ignored");
            return false;
        }

        let (shutdown, mut shutdown_rx) = watch::channel(false);
        let tokens = self.tokens.clone();
        let attempts = self.attempts.clone();
        let interval = self.interval;

        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        match run_cleanup(tokens.as_ref(), attempts.as_ref()).await {
                            Ok(report) if !report.is_empty() => {
                                tracing::info!(
                                    tokens = report.tokens,
                                    attempts = report.attempts,
                                    blocks = report.blocks,
                                    "security cleanup pass removed expired data"
                                );
                            }
                            Ok(_) => {}
                            Err(error) => {
                                // Keep sweeping; the next pass retries.
                                tracing::error!(error = %error, "security cleanup pass failed");
                            }
                        }
                    }
                    _ = shutdown_rx.changed() => {
                        tracing::debug!("cleanup task shutting down");
                        break;
                    }
                }
            }
        });

        *runner = Some(RunningCleanup { shutdown, handle });
        tracing::info!(interval_secs = interval.as_secs(), "cleanup task started");
        true
    }

    /// Signal the background task to stop.
    ///
    /// Returns `false` if no task was running. Does not wait for the task to
    /// finish an in-flight sweep.
    pub fn stop(&self) -> bool {
        let Some(running) = self.lock_runner().take() else {
            return false;
        };
        // If the task already exited the send fails, which is fine.
        let _ = running.shutdown.send(true);
        drop(running.handle);
        tracing::info!("cleanup task stopped");
        true
    }

    pub fn is_running(&self) -> bool {
        self.lock_runner().is_some()
    }

    /// Run a single sweep inline and report what was removed.
    pub async fn run_once(&self) -> Result<CleanupReport, Error> {
        run_cleanup(self.tokens.as_ref(), self.attempts.as_ref()).await
    }

    fn lock_runner(&self) -> std::sync::MutexGuard<'_, Option<RunningCleanup>> {
        self.runner.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl<T, A> Drop for CleanupService<T, A>
where
    T: ResetTokenRepository,
    A: ResetAttemptRepository,
{
    fn drop(&mut self) {
        if let Some(running) = self.lock_runner().take() {
            let _ = running.shutdown.send(true);
        }
    }
}

/// One sweep: purge old tokens, stale attempt counters, and lapsed blocks.
async fn run_cleanup<T, A>(tokens: &T, attempts: &A) -> Result<CleanupReport, Error>
where
    T: ResetTokenRepository,
    A: ResetAttemptRepository,
{
    let now = Utc::now();
    let removed_tokens = tokens.cleanup_expired(now - TOKEN_RETENTION).await?;
    let removed_attempts = attempts.cleanup_stale(now - ATTEMPT_RETENTION).await?;
    let removed_blocks = attempts.cleanup_lapsed_blocks(now).await?;

    Ok(CleanupReport {
        tokens: removed_tokens,
        attempts: removed_attempts,
        blocks: removed_blocks,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{NewResetToken, ResetAttempt, ResetToken, UserId, id::generate_prefixed_id};
    use async_trait::async_trait;
    use chrono::DateTime;
    use std::sync::Mutex;

    /// Mock repository for testing
    struct MockTokenRepository {
        rows: Mutex<Vec<ResetToken>>,
    }

    impl MockTokenRepository {
        fn new() -> Self {
            Self {
                rows: Mutex::new(Vec::new()),
            }
        }

        fn insert_created_at(&self, created_at: DateTime<Utc>) {
            self.rows.lock().unwrap().push(ResetToken {
                id: generate_prefixed_id("prt"),
                user_id: UserId::new_random(),
                token: crate::crypto::generate_reset_token(),
                expires_at: created_at + Duration::minutes(15),
                used: false,
                created_at,
            });
        }

        fn len(&self) -> usize {
            self.rows.lock().unwrap().len()
        }
    }

    #[async_trait]
    impl ResetTokenRepository for MockTokenRepository {
        async fn create_token(&self, new_token: NewResetToken) -> Result<ResetToken, Error> {
            let row = ResetToken {
                id: generate_prefixed_id("prt"),
                user_id: new_token.user_id,
                token: new_token.token,
                expires_at: new_token.expires_at,
                used: false,
                created_at: Utc::now(),
            };
            self.rows.lock().unwrap().push(row.clone());
            Ok(row)
        }

        async fn find_by_token(&self, token: &str) -> Result<Option<ResetToken>, Error> {
            Ok(self
                .rows
                .lock()
                .unwrap()
                .iter()
                .find(|t| t.token == token)
                .cloned())
        }

        async fn mark_used(&self, id: &str) -> Result<bool, Error> {
            let mut rows = self.rows.lock().unwrap();
            match rows.iter_mut().find(|t| t.id == id && !t.used) {
                Some(row) => {
                    row.used = true;
                    Ok(true)
                }
                None => Ok(false),
            }
        }

        async fn cleanup_expired(&self, before: DateTime<Utc>) -> Result<u64, Error> {
            let mut rows = self.rows.lock().unwrap();
            let before_len = rows.len();
            rows.retain(|t| t.created_at >= before);
            Ok((before_len - rows.len()) as u64)
        }
    }

    struct MockAttemptRepository {
        rows: Mutex<Vec<ResetAttempt>>,
    }

    impl MockAttemptRepository {
        fn new() -> Self {
            Self {
                rows: Mutex::new(Vec::new()),
            }
        }

        fn insert(&self, last_attempt_at: DateTime<Utc>, blocked_until: Option<DateTime<Utc>>) {
            let mut rows = self.rows.lock().unwrap();
            let id = rows.len() as i64 + 1;
            rows.push(ResetAttempt {
                id,
                email: format!("user{id}@example.com"),
                ip_address: "1.2.3.4".to_string(),
                attempt_count: 1,
                last_attempt_at,
                blocked_until,
                created_at: last_attempt_at,
            });
        }

        fn len(&self) -> usize {
            self.rows.lock().unwrap().len()
        }
    }

    #[async_trait]
    impl ResetAttemptRepository for MockAttemptRepository {
        async fn find(
            &self,
            email: &str,
            ip_address: &str,
        ) -> Result<Option<ResetAttempt>, Error> {
            Ok(self
                .rows
                .lock()
                .unwrap()
                .iter()
                .find(|a| a.email == email && a.ip_address == ip_address)
                .cloned())
        }

        async fn create(&self, email: &str, ip_address: &str) -> Result<ResetAttempt, Error> {
            let mut rows = self.rows.lock().unwrap();
            let attempt = ResetAttempt {
                id: rows.len() as i64 + 1,
                email: email.to_string(),
                ip_address: ip_address.to_string(),
                attempt_count: 1,
                last_attempt_at: Utc::now(),
                blocked_until: None,
                created_at: Utc::now(),
            };
            rows.push(attempt.clone());
            Ok(attempt)
        }

        async fn increment(&self, id: i64) -> Result<ResetAttempt, Error> {
            let mut rows = self.rows.lock().unwrap();
            let row = rows.iter_mut().find(|a| a.id == id).unwrap();
            row.attempt_count += 1;
            row.last_attempt_at = Utc::now();
            Ok(row.clone())
        }

        async fn restart_window(&self, id: i64) -> Result<(), Error> {
            let mut rows = self.rows.lock().unwrap();
            let row = rows.iter_mut().find(|a| a.id == id).unwrap();
            row.attempt_count = 1;
            row.blocked_until = None;
            row.last_attempt_at = Utc::now();
            Ok(())
        }

        async fn block(&self, id: i64, until: DateTime<Utc>) -> Result<(), Error> {
            let mut rows = self.rows.lock().unwrap();
            rows.iter_mut().find(|a| a.id == id).unwrap().blocked_until = Some(until);
            Ok(())
        }

        async fn clear(&self, _email: &str, _ip_address: &str) -> Result<(), Error> {
            Ok(())
        }

        async fn cleanup_stale(&self, before: DateTime<Utc>) -> Result<u64, Error> {
            let mut rows = self.rows.lock().unwrap();
            let before_len = rows.len();
            rows.retain(|a| a.last_attempt_at >= before);
            Ok((before_len - rows.len()) as u64)
        }

        async fn cleanup_lapsed_blocks(&self, now: DateTime<Utc>) -> Result<u64, Error> {
            let mut rows = self.rows.lock().unwrap();
            let before_len = rows.len();
            rows.retain(|a| !a.blocked_until.is_some_and(|until| until < now));
            Ok((before_len - rows.len()) as u64)
        }
    }

    fn service(
        tokens: Arc<MockTokenRepository>,
        attempts: Arc<MockAttemptRepository>,
    ) -> CleanupService<MockTokenRepository, MockAttemptRepository> {
        CleanupService::new(tokens, attempts)
    }

    #[tokio::test]
    async fn test_run_once_reports_removed_counts() {
        let tokens = Arc::new(MockTokenRepository::new());
        let attempts = Arc::new(MockAttemptRepository::new());
        let now = Utc::now();

        // Two tokens past retention, one fresh
        tokens.insert_created_at(now - Duration::hours(2));
        tokens.insert_created_at(now - Duration::minutes(61));
        tokens.insert_created_at(now - Duration::minutes(5));

        // One stale attempt, one lapsed block, one live
        attempts.insert(now - Duration::hours(25), None);
        attempts.insert(now - Duration::minutes(5), Some(now - Duration::minutes(1)));
        attempts.insert(now - Duration::minutes(5), None);

        let report = service(tokens.clone(), attempts.clone())
            .run_once()
            .await
            .unwrap();

        assert_eq!(report.tokens, 2);
        assert_eq!(report.attempts, 1);
        assert_eq!(report.blocks, 1);
        assert!(!report.is_empty());
        assert_eq!(tokens.len(), 1);
        assert_eq!(attempts.len(), 1);
    }

    #[tokio::test]
    async fn test_run_once_empty_report_when_nothing_expired() {
        let tokens = Arc::new(MockTokenRepository::new());
        let attempts = Arc::new(MockAttemptRepository::new());
        tokens.insert_created_at(Utc::now());

        let report = service(tokens, attempts).run_once().await.unwrap();
        assert!(report.is_empty());
    }

    #[tokio::test]
    async fn test_start_is_idempotent() {
        let tokens = Arc::new(MockTokenRepository::new());
        let attempts = Arc::new(MockAttemptRepository::new());
        let cleanup = service(tokens, attempts);

        assert!(!cleanup.is_running());
        assert!(cleanup.start());
        assert!(cleanup.is_running());
        assert!(!cleanup.start());

        assert!(cleanup.stop());
        assert!(!cleanup.is_running());
        assert!(!cleanup.stop());
    }

    #[tokio::test]
    async fn test_started_task_sweeps_immediately() {
        let tokens = Arc::new(MockTokenRepository::new());
        let attempts = Arc::new(MockAttemptRepository::new());
        tokens.insert_created_at(Utc::now() - Duration::hours(2));

        let cleanup = service(tokens.clone(), attempts);
        cleanup.start();

        // First tick fires at once; give the task a moment to run it.
        for _ in 0..50 {
            if tokens.len() == 0 {
                break;
            }
            tokio::time::sleep(StdDuration::from_millis(10)).await;
        }
        assert_eq!(tokens.len(), 0);
        cleanup.stop();
    }
}
