//! Adapters that wrap a [`RepositoryProvider`] and implement the individual
//! repository traits, so `Arc`-based services can all share one backend.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::{
    Error, NewResetToken, ResetAttempt, ResetToken, User, UserId,
    repositories::{
        RepositoryProvider, ResetAttemptRepository, ResetTokenRepository, UserRepository,
    },
};

pub struct UserRepositoryAdapter<R: RepositoryProvider> {
    provider: Arc<R>,
}

impl<R: RepositoryProvider> UserRepositoryAdapter<R> {
    pub fn new(provider: Arc<R>) -> Self {
        Self { provider }
    }
}

#[async_trait]
impl<R: RepositoryProvider> UserRepository for UserRepositoryAdapter<R> {
    async fn find_by_id(&self, id: &UserId) -> Result<Option<User>, Error> {
        self.provider.user().find_by_id(id).await
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<User>, Error> {
        self.provider.user().find_by_email(email).await
    }

    async fn set_password_hash(&self, user_id: &UserId, hash: &str) -> Result<(), Error> {
        self.provider.user().set_password_hash(user_id, hash).await
    }
}

pub struct TokenRepositoryAdapter<R: RepositoryProvider> {
    provider: Arc<R>,
}

impl<R: RepositoryProvider> TokenRepositoryAdapter<R> {
    pub fn new(provider: Arc<R>) -> Self {
        Self { provider }
    }
}

#[async_trait]
impl<R: RepositoryProvider> ResetTokenRepository for TokenRepositoryAdapter<R> {
    async fn create_token(&self, new_token: NewResetToken) -> Result<ResetToken, Error> {
        self.provider.token().create_token(new_token).await
    }

    async fn find_by_token(&self, token: &str) -> Result<Option<ResetToken>, Error> {
        self.provider.token().find_by_token(token).await
    }

    async fn mark_used(&self, id: &str) -> Result<bool, Error> {
        self.provider.token().mark_used(id).await
    }

    async fn cleanup_expired(&self, before: DateTime<Utc>) -> Result<u64, Error> {
        self.provider.token().cleanup_expired(before).await
    }
}

pub struct AttemptRepositoryAdapter<R: RepositoryProvider> {
    provider: Arc<R>,
}

impl<R: RepositoryProvider> AttemptRepositoryAdapter<R> {
    pub fn new(provider: Arc<R>) -> Self {
        Self { provider }
    }
}

#[async_trait]
impl<R: RepositoryProvider> ResetAttemptRepository for AttemptRepositoryAdapter<R> {
    async fn find(&self, email: &str, ip_address: &str) -> Result<Option<ResetAttempt>, Error> {
        self.provider.attempt().find(email, ip_address).await
    }

    async fn create(&self, email: &str, ip_address: &str) -> Result<ResetAttempt, Error> {
        self.provider.attempt().create(email, ip_address).await
    }

    async fn increment(&self, id: i64) -> Result<ResetAttempt, Error> {
        self.provider.attempt().increment(id).await
    }

    async fn restart_window(&self, id: i64) -> Result<(), Error> {
        self.provider.attempt().restart_window(id).await
    }

    async fn block(&self, id: i64, until: DateTime<Utc>) -> Result<(), Error> {
        self.provider.attempt().block(id, until).await
    }

    async fn clear(&self, email: &str, ip_address: &str) -> Result<(), Error> {
        self.provider.attempt().clear(email, ip_address).await
    }

    async fn cleanup_stale(&self, before: DateTime<Utc>) -> Result<u64, Error> {
        self.provider.attempt().cleanup_stale(before).await
    }

    async fn cleanup_lapsed_blocks(&self, now: DateTime<Utc>) -> Result<u64, Error> {
        self.provider.attempt().cleanup_lapsed_blocks(now).await
    }
}
