//! Builder pattern for constructing Vigil instances
//!
//! This module provides a type-safe builder for creating [`Vigil`] instances
//! with compile-time validation of storage configuration.
//!
//! # Example
//!
//! ```rust,no_run
//! use vigil::{JwtConfig, VigilBuilder};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let vigil = VigilBuilder::new()
//!         .with_sqlite("sqlite::memory:")
//!         .await?
//!         .with_jwt(JwtConfig::new_hs256(b"change-me".to_vec()))
//!         .apply_migrations(true)
//!         .build()
//!         .await?;
//!
//!     vigil.health_check().await?;
//!     Ok(())
//! }
//! ```

use std::sync::Arc;

use chrono::Duration;
use vigil_core::{
    GeolocationResolver, IpApiResolver, JwtConfig, LockoutConfig,
    repositories::RepositoryProvider,
    services::{FraudConfig, TokenService},
};

use crate::Vigil;

// ============================================================================
// Error Types
// ============================================================================

/// Errors that can occur when building a Vigil instance.
#[derive(Debug, thiserror::Error)]
pub enum VigilBuilderError {
    /// Failed to connect to storage backend
    #[error("Storage connection failed: {0}")]
    StorageConnection(String),

    /// Failed to run database migrations
    #[error("Migration failed: {0}")]
    Migration(String),

    /// Invalid configuration provided
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),
}

// ============================================================================
// Type-State Markers
// ============================================================================

/// Marker type indicating no storage has been configured yet.
///
/// This is the initial state of [`VigilBuilder`].
pub struct NoStorage;

/// Marker type indicating storage has been configured.
///
/// Contains the repository provider that will be used by Vigil.
pub struct WithStorage<R: RepositoryProvider> {
    repositories: Arc<R>,
}

// ============================================================================
// Builder Implementation
// ============================================================================

/// A type-safe builder for constructing [`Vigil`] instances.
///
/// The builder uses a type-state pattern to ensure that storage is
/// configured before building. JWT configuration is the one runtime
/// requirement: [`build`](VigilBuilder::build) fails without it, since
/// every session and step-up token needs signing keys.
///
/// # Type States
///
/// - [`NoStorage`]: Initial state, storage must be configured
/// - [`WithStorage<R>`]: Storage configured, ready to build or add more configuration
pub struct VigilBuilder<Storage> {
    storage: Storage,
    jwt_config: Option<JwtConfig>,
    lockout_config: LockoutConfig,
    fraud_config: FraudConfig,
    resolver: Option<Arc<dyn GeolocationResolver>>,
    issuer: String,
    session_ttl: Duration,
    step_up_ttl: Duration,
    apply_migrations: bool,
    inline_fraud: bool,
}

impl Default for VigilBuilder<NoStorage> {
    fn default() -> Self {
        Self::new()
    }
}

impl VigilBuilder<NoStorage> {
    /// Create a new builder with default configuration.
    ///
    /// # Defaults
    ///
    /// - Lockout: 5 failed attempts, 30 minute lock
    /// - Session tokens: 24 hours
    /// - Step-up tokens: 5 minutes
    /// - Geolocation: ip-api.com resolver
    /// - Apply migrations: false
    pub fn new() -> Self {
        Self {
            storage: NoStorage,
            jwt_config: None,
            lockout_config: LockoutConfig::default(),
            fraud_config: FraudConfig::default(),
            resolver: None,
            issuer: "vigil".to_string(),
            session_ttl: Duration::hours(24),
            step_up_ttl: Duration::minutes(5),
            apply_migrations: false,
            inline_fraud: false,
        }
    }
}

// ============================================================================
// Storage Configuration Methods (NoStorage -> WithStorage)
// ============================================================================

impl VigilBuilder<NoStorage> {
    /// Configure SQLite storage by connecting to the given URL.
    ///
    /// # Arguments
    ///
    /// * `url` - SQLite connection URL (e.g., "sqlite::memory:" or "sqlite://path/to/db.sqlite")
    pub async fn with_sqlite(
        self,
        url: &str,
    ) -> Result<
        VigilBuilder<WithStorage<vigil_storage_sqlite::SqliteRepositoryProvider>>,
        VigilBuilderError,
    > {
        let pool = sqlx::SqlitePool::connect(url)
            .await
            .map_err(|e| VigilBuilderError::StorageConnection(e.to_string()))?;

        Ok(self.with_sqlite_pool(pool))
    }

    /// Configure SQLite storage with an existing connection pool.
    ///
    /// Use this when you already have a SQLite connection pool and want to
    /// share it with Vigil.
    pub fn with_sqlite_pool(
        self,
        pool: sqlx::SqlitePool,
    ) -> VigilBuilder<WithStorage<vigil_storage_sqlite::SqliteRepositoryProvider>> {
        let repositories = Arc::new(vigil_storage_sqlite::SqliteRepositoryProvider::new(pool));
        self.with_repositories(repositories)
    }

    /// Configure a custom repository provider.
    pub fn with_repositories<R: RepositoryProvider>(
        self,
        repositories: Arc<R>,
    ) -> VigilBuilder<WithStorage<R>> {
        VigilBuilder {
            storage: WithStorage { repositories },
            jwt_config: self.jwt_config,
            lockout_config: self.lockout_config,
            fraud_config: self.fraud_config,
            resolver: self.resolver,
            issuer: self.issuer,
            session_ttl: self.session_ttl,
            step_up_ttl: self.step_up_ttl,
            apply_migrations: self.apply_migrations,
            inline_fraud: self.inline_fraud,
        }
    }
}

// ============================================================================
// Configuration Methods (available after storage is configured)
// ============================================================================

impl<R: RepositoryProvider> VigilBuilder<WithStorage<R>> {
    /// Set the JWT configuration used to sign session and step-up tokens.
    ///
    /// Required: [`build`](VigilBuilder::build) fails without it.
    pub fn with_jwt(mut self, config: JwtConfig) -> Self {
        self.jwt_config = Some(config);
        self
    }

    /// Override the lockout policy.
    ///
    /// Default: 5 failed attempts lock the account for 30 minutes.
    pub fn with_lockout(mut self, config: LockoutConfig) -> Self {
        self.lockout_config = config;
        self
    }

    /// Override the fraud check thresholds and windows.
    pub fn with_fraud_config(mut self, config: FraudConfig) -> Self {
        self.fraud_config = config;
        self
    }

    /// Use a custom geolocation resolver instead of ip-api.com.
    pub fn with_resolver(mut self, resolver: Arc<dyn GeolocationResolver>) -> Self {
        self.resolver = Some(resolver);
        self
    }

    /// Set the issuer used in token claims and TOTP provisioning URIs.
    ///
    /// Default: "vigil"
    pub fn with_issuer(mut self, issuer: impl Into<String>) -> Self {
        self.issuer = issuer.into();
        self
    }

    /// Set the session token lifetime.
    ///
    /// Default: 24 hours
    pub fn with_session_ttl(mut self, ttl: Duration) -> Self {
        self.session_ttl = ttl;
        self
    }

    /// Set the step-up token lifetime.
    ///
    /// Default: 5 minutes
    pub fn with_step_up_ttl(mut self, ttl: Duration) -> Self {
        self.step_up_ttl = ttl;
        self
    }

    /// Set whether to automatically apply database migrations during build.
    ///
    /// Default: false
    pub fn apply_migrations(mut self, apply: bool) -> Self {
        self.apply_migrations = apply;
        self
    }

    /// Evaluate fraud checks on the calling task instead of spawning.
    ///
    /// Production keeps the default (spawned, fire-and-forget). Inline
    /// evaluation makes the engine's writes visible as soon as a login
    /// call returns, which embedding tests rely on.
    pub fn with_inline_fraud(mut self, inline: bool) -> Self {
        self.inline_fraud = inline;
        self
    }

    /// Build the Vigil instance.
    ///
    /// If `apply_migrations(true)` was called, migrations are applied
    /// before returning.
    pub async fn build(self) -> Result<Vigil<R>, VigilBuilderError> {
        let jwt_config = self.jwt_config.ok_or_else(|| {
            VigilBuilderError::InvalidConfiguration(
                "JWT configuration is required; call with_jwt()".to_string(),
            )
        })?;

        let resolver: Arc<dyn GeolocationResolver> = match self.resolver {
            Some(resolver) => resolver,
            None => Arc::new(IpApiResolver::new().map_err(|e| {
                VigilBuilderError::InvalidConfiguration(e.to_string())
            })?),
        };

        if self.apply_migrations {
            self.storage
                .repositories
                .migrate()
                .await
                .map_err(|e| VigilBuilderError::Migration(e.to_string()))?;
        }

        let token_service = TokenService::new(jwt_config.with_issuer(self.issuer.clone()))
            .with_session_ttl(self.session_ttl)
            .with_step_up_ttl(self.step_up_ttl);

        Ok(Vigil::from_parts(
            self.storage.repositories,
            token_service,
            self.lockout_config,
            self.fraud_config,
            resolver,
            self.issuer,
            self.inline_fraud,
        ))
    }
}
