//! Repository traits for data access layer
//!
//! This module defines the repository interfaces that services use to interact with storage.
//! These traits provide a clean abstraction over the underlying storage implementation.
//!
//! # Trait Hierarchy
//!
//! The repository system uses a composable trait hierarchy:
//!
//! - Individual `*Repository` traits define the operations for each data domain
//! - Individual `*RepositoryProvider` traits provide access to each repository type
//! - [`RepositoryProvider`] is a supertrait combining all provider traits plus lifecycle methods
//!
//! This design allows storage backends to:
//! - Implement only the repositories they need
//! - Provide a unified interface through the full `RepositoryProvider` trait
//! - Share repository implementations across different backend types

pub mod account;
pub mod adapter;
pub mod audit_log;
pub mod fraud_flag;
pub mod geo_profile;
pub mod login_attempt;
pub mod password;

pub use account::AccountRepository;
pub use adapter::{
    AccountRepositoryAdapter, AuditLogRepositoryAdapter, FraudFlagRepositoryAdapter,
    GeoProfileRepositoryAdapter, LoginAttemptRepositoryAdapter, PasswordRepositoryAdapter,
};
pub use audit_log::AuditLogRepository;
pub use fraud_flag::FraudFlagRepository;
pub use geo_profile::GeoProfileRepository;
pub use login_attempt::LoginAttemptRepository;
pub use password::PasswordRepository;

use async_trait::async_trait;

use crate::Error;

// ============================================================================
// Individual Repository Provider Traits
// ============================================================================

/// Provider trait for account repository access.
///
/// Implement this trait to provide account management functionality.
pub trait AccountRepositoryProvider: Send + Sync + 'static {
    /// The account repository implementation type
    type AccountRepo: AccountRepository;

    /// Get the account repository
    fn account(&self) -> &Self::AccountRepo;
}

/// Provider trait for password repository access.
///
/// Implement this trait to provide password credential storage.
pub trait PasswordRepositoryProvider: Send + Sync + 'static {
    /// The password repository implementation type
    type PasswordRepo: PasswordRepository;

    /// Get the password repository
    fn password(&self) -> &Self::PasswordRepo;
}

/// Provider trait for login attempt repository access.
///
/// Implement this trait to provide the login attempt trail the fraud
/// checks query.
pub trait LoginAttemptRepositoryProvider: Send + Sync + 'static {
    /// The login attempt repository implementation type
    type LoginAttemptRepo: LoginAttemptRepository;

    /// Get the login attempt repository
    fn login_attempt(&self) -> &Self::LoginAttemptRepo;
}

/// Provider trait for geo profile repository access.
///
/// Implement this trait to provide per-user location history.
pub trait GeoProfileRepositoryProvider: Send + Sync + 'static {
    /// The geo profile repository implementation type
    type GeoProfileRepo: GeoProfileRepository;

    /// Get the geo profile repository
    fn geo_profile(&self) -> &Self::GeoProfileRepo;
}

/// Provider trait for fraud flag repository access.
///
/// Implement this trait to provide fraud flag persistence.
pub trait FraudFlagRepositoryProvider: Send + Sync + 'static {
    /// The fraud flag repository implementation type
    type FraudFlagRepo: FraudFlagRepository;

    /// Get the fraud flag repository
    fn fraud_flag(&self) -> &Self::FraudFlagRepo;
}

/// Provider trait for audit log repository access.
///
/// Implement this trait to provide the audit trail.
pub trait AuditLogRepositoryProvider: Send + Sync + 'static {
    /// The audit log repository implementation type
    type AuditLogRepo: AuditLogRepository;

    /// Get the audit log repository
    fn audit_log(&self) -> &Self::AuditLogRepo;
}

// ============================================================================
// Unified Repository Provider Trait
// ============================================================================

/// Provider trait that storage implementations must implement to provide all repositories.
///
/// This trait is a supertrait combining all individual repository provider traits,
/// plus lifecycle methods for migrations and health checks.
///
/// # Implementing a Custom Storage Backend
///
/// To implement a custom storage backend, you need to:
/// 1. Implement each individual `*Repository` trait for your backend
/// 2. Implement each individual `*RepositoryProvider` trait
/// 3. Implement the `RepositoryProvider` trait with `migrate()` and `health_check()`
#[async_trait]
pub trait RepositoryProvider:
    AccountRepositoryProvider
    + PasswordRepositoryProvider
    + LoginAttemptRepositoryProvider
    + GeoProfileRepositoryProvider
    + FraudFlagRepositoryProvider
    + AuditLogRepositoryProvider
{
    /// Run migrations for all repositories
    async fn migrate(&self) -> Result<(), Error>;

    /// Health check for all repositories
    async fn health_check(&self) -> Result<(), Error>;
}
