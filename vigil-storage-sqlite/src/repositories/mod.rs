//! Repository implementations for SQLite storage

pub mod account;
pub mod audit_log;
pub mod fraud_flag;
pub mod geo_profile;
pub mod login_attempt;
pub mod password;

pub use account::SqliteAccountRepository;
pub use audit_log::SqliteAuditLogRepository;
pub use fraud_flag::SqliteFraudFlagRepository;
pub use geo_profile::SqliteGeoProfileRepository;
pub use login_attempt::SqliteLoginAttemptRepository;
pub use password::SqlitePasswordRepository;

use async_trait::async_trait;
use sqlx::SqlitePool;
use std::sync::Arc;
use vigil_core::{
    Error,
    error::StorageError,
    repositories::{
        AccountRepositoryProvider, AuditLogRepositoryProvider, FraudFlagRepositoryProvider,
        GeoProfileRepositoryProvider, LoginAttemptRepositoryProvider, PasswordRepositoryProvider,
        RepositoryProvider,
    },
};

/// Repository provider implementation for SQLite
///
/// This struct implements all the individual repository provider traits
/// as well as the unified `RepositoryProvider` trait.
pub struct SqliteRepositoryProvider {
    pool: SqlitePool,
    account: Arc<SqliteAccountRepository>,
    password: Arc<SqlitePasswordRepository>,
    login_attempt: Arc<SqliteLoginAttemptRepository>,
    geo_profile: Arc<SqliteGeoProfileRepository>,
    fraud_flag: Arc<SqliteFraudFlagRepository>,
    audit_log: Arc<SqliteAuditLogRepository>,
}

impl SqliteRepositoryProvider {
    pub fn new(pool: SqlitePool) -> Self {
        let account = Arc::new(SqliteAccountRepository::new(pool.clone()));
        let password = Arc::new(SqlitePasswordRepository::new(pool.clone()));
        let login_attempt = Arc::new(SqliteLoginAttemptRepository::new(pool.clone()));
        let geo_profile = Arc::new(SqliteGeoProfileRepository::new(pool.clone()));
        let fraud_flag = Arc::new(SqliteFraudFlagRepository::new(pool.clone()));
        let audit_log = Arc::new(SqliteAuditLogRepository::new(pool.clone()));

        Self {
            pool,
            account,
            password,
            login_attempt,
            geo_profile,
            fraud_flag,
            audit_log,
        }
    }
}

// Implement individual provider traits

impl AccountRepositoryProvider for SqliteRepositoryProvider {
    type AccountRepo = SqliteAccountRepository;

    fn account(&self) -> &Self::AccountRepo {
        &self.account
    }
}

impl PasswordRepositoryProvider for SqliteRepositoryProvider {
    type PasswordRepo = SqlitePasswordRepository;

    fn password(&self) -> &Self::PasswordRepo {
        &self.password
    }
}

impl LoginAttemptRepositoryProvider for SqliteRepositoryProvider {
    type LoginAttemptRepo = SqliteLoginAttemptRepository;

    fn login_attempt(&self) -> &Self::LoginAttemptRepo {
        &self.login_attempt
    }
}

impl GeoProfileRepositoryProvider for SqliteRepositoryProvider {
    type GeoProfileRepo = SqliteGeoProfileRepository;

    fn geo_profile(&self) -> &Self::GeoProfileRepo {
        &self.geo_profile
    }
}

impl FraudFlagRepositoryProvider for SqliteRepositoryProvider {
    type FraudFlagRepo = SqliteFraudFlagRepository;

    fn fraud_flag(&self) -> &Self::FraudFlagRepo {
        &self.fraud_flag
    }
}

impl AuditLogRepositoryProvider for SqliteRepositoryProvider {
    type AuditLogRepo = SqliteAuditLogRepository;

    fn audit_log(&self) -> &Self::AuditLogRepo {
        &self.audit_log
    }
}

// Implement the unified RepositoryProvider trait

#[async_trait]
impl RepositoryProvider for SqliteRepositoryProvider {
    async fn migrate(&self) -> Result<(), Error> {
        use crate::migrations::{SqliteMigrationManager, all_migrations};

        let manager = SqliteMigrationManager::new(self.pool.clone());
        manager.initialize().await.map_err(|e| {
            tracing::error!(error = %e, "Failed to initialize migrations");
            Error::Storage(StorageError::Migration(
                "Failed to initialize migrations".to_string(),
            ))
        })?;

        manager.up(&all_migrations()).await.map_err(|e| {
            tracing::error!(error = %e, "Failed to run migrations");
            Error::Storage(StorageError::Migration(
                "Failed to run migrations".to_string(),
            ))
        })?;

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
