//! Repository traits for data access layer
//!
//! This module defines the repository interfaces the services use to reach
//! durable storage. The user store is conceptually external (accounts are
//! managed elsewhere); the token and attempt stores belong to this subsystem.
//!
//! # Trait Hierarchy
//!
//! - Individual `*Repository` traits define the operations for each data domain
//! - Individual `*RepositoryProvider` traits provide access to each repository type
//! - [`RepositoryProvider`] is a supertrait combining all provider traits plus
//!   lifecycle methods
//!
//! The adapters in [`adapter`] wrap an `Arc<R: RepositoryProvider>` so that
//! services holding `Arc`s of individual repositories can share one backend.

pub mod adapter;
pub mod attempt;
pub mod token;
pub mod user;

pub use adapter::{AttemptRepositoryAdapter, TokenRepositoryAdapter, UserRepositoryAdapter};
pub use attempt::ResetAttemptRepository;
pub use token::ResetTokenRepository;
pub use user::UserRepository;

use async_trait::async_trait;

use crate::Error;

/// Provider trait for user repository access.
pub trait UserRepositoryProvider: Send + Sync + 'static {
    /// The user repository implementation type
    type UserRepo: UserRepository;

    /// Get the user repository
    fn user(&self) -> &Self::UserRepo;
}

/// Provider trait for reset-token repository access.
pub trait TokenRepositoryProvider: Send + Sync + 'static {
    /// The token repository implementation type
    type TokenRepo: ResetTokenRepository;

    /// Get the token repository
    fn token(&self) -> &Self::TokenRepo;
}

/// Provider trait for reset-attempt repository access.
pub trait AttemptRepositoryProvider: Send + Sync + 'static {
    /// The attempt repository implementation type
    type AttemptRepo: ResetAttemptRepository;

    /// Get the attempt repository
    fn attempt(&self) -> &Self::AttemptRepo;
}

/// Provider trait that storage backends implement to supply all repositories,
/// plus lifecycle methods for migrations and health checks.
#[async_trait]
pub trait RepositoryProvider:
    UserRepositoryProvider + TokenRepositoryProvider + AttemptRepositoryProvider
{
    /// Run migrations for all repositories
    async fn migrate(&self) -> Result<(), Error>;

    /// Health check for all repositories
    async fn health_check(&self) -> Result<(), Error>;
}
