//! Builder pattern for constructing Rekey instances
//!
//! This module provides a type-safe builder for creating [`Rekey`] instances
//! with compile-time validation of storage configuration.
//!
//! # Example
//!
//! ```rust,no_run
//! use rekey::RekeyBuilder;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // Build with SQLite and auto-migration
//!     let rekey = RekeyBuilder::new()
//!         .with_sqlite("sqlite::memory:")
//!         .await?
//!         .apply_migrations(true)
//!         .build()
//!         .await?;
//!
//!     // Or build without auto-migration and run manually
//!     let rekey = RekeyBuilder::new()
//!         .with_sqlite("sqlite::memory:")
//!         .await?
//!         .build()
//!         .await?;
//!     rekey.migrate().await?;
//!
//!     Ok(())
//! }
//! ```

use std::sync::Arc;

use chrono::Duration;
use rekey_core::{
    RateLimitConfig, repositories::RepositoryProvider, services::ResetNotifier,
};

use crate::Rekey;

/// Errors that can occur when building a Rekey instance.
#[derive(Debug, thiserror::Error)]
pub enum RekeyBuilderError {
    /// Failed to connect to storage backend
    #[error("Storage connection failed: {0}")]
    StorageConnection(String),

    /// Failed to run database migrations
    #[error("Migration failed: {0}")]
    Migration(String),
}

/// Marker type indicating no storage has been configured yet.
///
/// This is the initial state of [`RekeyBuilder`].
pub struct NoStorage;

/// Marker type indicating storage has been configured.
///
/// Contains the repository provider that will be used by Rekey.
pub struct WithStorage<R: RepositoryProvider> {
    repositories: Arc<R>,
}

/// A type-safe builder for constructing [`Rekey`] instances.
///
/// The builder uses a type-state pattern to ensure that storage is configured
/// before building.
///
/// # Example
///
/// ```rust,no_run
/// use chrono::Duration;
/// use rekey::{RateLimitConfig, RekeyBuilder};
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let rekey = RekeyBuilder::new()
///         .with_sqlite("sqlite::memory:")
///         .await?
///         .with_token_ttl(Duration::minutes(30))
///         .with_rate_limit_config(RateLimitConfig {
///             max_attempts: 3,
///             ..RateLimitConfig::default()
///         })
///         .apply_migrations(true)
///         .build()
///         .await?;
///
///     Ok(())
/// }
/// ```
pub struct RekeyBuilder<Storage> {
    storage: Storage,
    notifier: Option<Arc<dyn ResetNotifier>>,
    rate_limit_config: RateLimitConfig,
    token_ttl: Duration,
    audit_capacity: Option<usize>,
    apply_migrations: bool,
}

impl RekeyBuilder<NoStorage> {
    /// Create a new builder with no storage configured.
    pub fn new() -> Self {
        Self {
            storage: NoStorage,
            notifier: None,
            rate_limit_config: RateLimitConfig::default(),
            token_ttl: Duration::minutes(15),
            audit_capacity: None,
            apply_migrations: false,
        }
    }

    /// Configure SQLite storage from a connection URL.
    #[cfg(feature = "sqlite")]
    pub async fn with_sqlite(
        self,
        url: &str,
    ) -> Result<
        RekeyBuilder<WithStorage<rekey_storage_sqlite::SqliteRepositoryProvider>>,
        RekeyBuilderError,
    > {
        let pool = rekey_storage_sqlite::connect(url)
            .await
            .map_err(|e| RekeyBuilderError::StorageConnection(e.to_string()))?;
        let repositories = Arc::new(rekey_storage_sqlite::SqliteRepositoryProvider::new(pool));
        Ok(self.with_repositories(repositories))
    }

    /// Configure an already-constructed repository provider.
    pub fn with_repositories<R: RepositoryProvider>(
        self,
        repositories: Arc<R>,
    ) -> RekeyBuilder<WithStorage<R>> {
        RekeyBuilder {
            storage: WithStorage { repositories },
            notifier: self.notifier,
            rate_limit_config: self.rate_limit_config,
            token_ttl: self.token_ttl,
            audit_capacity: self.audit_capacity,
            apply_migrations: self.apply_migrations,
        }
    }
}

impl Default for RekeyBuilder<NoStorage> {
    fn default() -> Self {
        Self::new()
    }
}

impl<Storage> RekeyBuilder<Storage> {
    /// Attach a notifier that delivers reset links out of band.
    pub fn with_notifier(mut self, notifier: Arc<dyn ResetNotifier>) -> Self {
        self.notifier = Some(notifier);
        self
    }

    /// Override the default rate-limit thresholds.
    pub fn with_rate_limit_config(mut self, config: RateLimitConfig) -> Self {
        self.rate_limit_config = config;
        self
    }

    /// Override the default 15-minute token lifetime.
    pub fn with_token_ttl(mut self, token_ttl: Duration) -> Self {
        self.token_ttl = token_ttl;
        self
    }

    /// Override the default 1000-event audit log capacity.
    pub fn with_audit_capacity(mut self, capacity: usize) -> Self {
        self.audit_capacity = Some(capacity);
        self
    }

    /// Run storage migrations during [`build`](RekeyBuilder::build).
    pub fn apply_migrations(mut self, apply: bool) -> Self {
        self.apply_migrations = apply;
        self
    }
}

impl<R: RepositoryProvider> RekeyBuilder<WithStorage<R>> {
    /// Construct the [`Rekey`] instance.
    pub async fn build(self) -> Result<Rekey<R>, RekeyBuilderError> {
        let rekey = Rekey::assemble(
            self.storage.repositories,
            self.notifier,
            self.rate_limit_config,
            self.token_ttl,
            self.audit_capacity,
        );

        if self.apply_migrations {
            rekey
                .migrate()
                .await
                .map_err(|e| RekeyBuilderError::Migration(e.to_string()))?;
        }

        Ok(rekey)
    }
}
