use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::{
    Error,
    account::{Account, NewAccount, UserId},
    geo::GeoLocation,
    repositories::{
        AccountRepository, AuditLogRepository, FraudFlagRepository, GeoProfileRepository,
        LoginAttemptRepository, PasswordRepository, RepositoryProvider,
    },
    storage::{
        AuditLogEntry, FraudFlag, GeoProfile, LoginAttempt, NewAuditLogEntry, NewFraudFlag,
        NewLoginAttempt,
    },
};

/// Adapter that wraps a RepositoryProvider and implements individual repository traits
pub struct AccountRepositoryAdapter<R: RepositoryProvider> {
    provider: Arc<R>,
}

impl<R: RepositoryProvider> AccountRepositoryAdapter<R> {
    pub fn new(provider: Arc<R>) -> Self {
        Self { provider }
    }
}

#[async_trait]
impl<R: RepositoryProvider> AccountRepository for AccountRepositoryAdapter<R> {
    async fn create(&self, account: NewAccount) -> Result<Account, Error> {
        self.provider.account().create(account).await
    }

    async fn find_by_id(&self, id: &UserId) -> Result<Option<Account>, Error> {
        self.provider.account().find_by_id(id).await
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<Account>, Error> {
        self.provider.account().find_by_email(email).await
    }

    async fn record_login_failure(
        &self,
        id: &UserId,
        threshold: u32,
        locked_until: DateTime<Utc>,
    ) -> Result<u32, Error> {
        self.provider
            .account()
            .record_login_failure(id, threshold, locked_until)
            .await
    }

    async fn record_login_success(&self, id: &UserId, now: DateTime<Utc>) -> Result<(), Error> {
        self.provider.account().record_login_success(id, now).await
    }

    async fn set_mfa_secret(&self, id: &UserId, secret: &str) -> Result<(), Error> {
        self.provider.account().set_mfa_secret(id, secret).await
    }
}

pub struct PasswordRepositoryAdapter<R: RepositoryProvider> {
    provider: Arc<R>,
}

impl<R: RepositoryProvider> PasswordRepositoryAdapter<R> {
    pub fn new(provider: Arc<R>) -> Self {
        Self { provider }
    }
}

#[async_trait]
impl<R: RepositoryProvider> PasswordRepository for PasswordRepositoryAdapter<R> {
    async fn set_password_hash(&self, user_id: &UserId, hash: &str) -> Result<(), Error> {
        self.provider.password().set_password_hash(user_id, hash).await
    }

    async fn get_password_hash(&self, user_id: &UserId) -> Result<Option<String>, Error> {
        self.provider.password().get_password_hash(user_id).await
    }
}

pub struct LoginAttemptRepositoryAdapter<R: RepositoryProvider> {
    provider: Arc<R>,
}

impl<R: RepositoryProvider> LoginAttemptRepositoryAdapter<R> {
    pub fn new(provider: Arc<R>) -> Self {
        Self { provider }
    }
}

#[async_trait]
impl<R: RepositoryProvider> LoginAttemptRepository for LoginAttemptRepositoryAdapter<R> {
    async fn record(&self, attempt: NewLoginAttempt) -> Result<LoginAttempt, Error> {
        self.provider.login_attempt().record(attempt).await
    }

    async fn count_failures_since(
        &self,
        user_id: &UserId,
        since: DateTime<Utc>,
    ) -> Result<u32, Error> {
        self.provider
            .login_attempt()
            .count_failures_since(user_id, since)
            .await
    }

    async fn count_successes_since(
        &self,
        user_id: &UserId,
        since: DateTime<Utc>,
    ) -> Result<u32, Error> {
        self.provider
            .login_attempt()
            .count_successes_since(user_id, since)
            .await
    }

    async fn distinct_success_ips_since(
        &self,
        user_id: &UserId,
        since: DateTime<Utc>,
    ) -> Result<Vec<String>, Error> {
        self.provider
            .login_attempt()
            .distinct_success_ips_since(user_id, since)
            .await
    }

    async fn recent(&self, user_id: &UserId, limit: u32) -> Result<Vec<LoginAttempt>, Error> {
        self.provider.login_attempt().recent(user_id, limit).await
    }
}

pub struct GeoProfileRepositoryAdapter<R: RepositoryProvider> {
    provider: Arc<R>,
}

impl<R: RepositoryProvider> GeoProfileRepositoryAdapter<R> {
    pub fn new(provider: Arc<R>) -> Self {
        Self { provider }
    }
}

#[async_trait]
impl<R: RepositoryProvider> GeoProfileRepository for GeoProfileRepositoryAdapter<R> {
    async fn trusted_profiles(&self, user_id: &UserId) -> Result<Vec<GeoProfile>, Error> {
        self.provider.geo_profile().trusted_profiles(user_id).await
    }

    async fn record_visit(
        &self,
        user_id: &UserId,
        location: &GeoLocation,
    ) -> Result<GeoProfile, Error> {
        self.provider
            .geo_profile()
            .record_visit(user_id, location)
            .await
    }
}

pub struct FraudFlagRepositoryAdapter<R: RepositoryProvider> {
    provider: Arc<R>,
}

impl<R: RepositoryProvider> FraudFlagRepositoryAdapter<R> {
    pub fn new(provider: Arc<R>) -> Self {
        Self { provider }
    }
}

#[async_trait]
impl<R: RepositoryProvider> FraudFlagRepository for FraudFlagRepositoryAdapter<R> {
    async fn insert(&self, flag: NewFraudFlag) -> Result<FraudFlag, Error> {
        self.provider.fraud_flag().insert(flag).await
    }

    async fn recent(&self, user_id: &UserId, limit: u32) -> Result<Vec<FraudFlag>, Error> {
        self.provider.fraud_flag().recent(user_id, limit).await
    }
}

pub struct AuditLogRepositoryAdapter<R: RepositoryProvider> {
    provider: Arc<R>,
}

impl<R: RepositoryProvider> AuditLogRepositoryAdapter<R> {
    pub fn new(provider: Arc<R>) -> Self {
        Self { provider }
    }
}

#[async_trait]
impl<R: RepositoryProvider> AuditLogRepository for AuditLogRepositoryAdapter<R> {
    async fn insert(&self, entry: NewAuditLogEntry) -> Result<AuditLogEntry, Error> {
        self.provider.audit_log().insert(entry).await
    }

    async fn recent_for_user(
        &self,
        user_id: &UserId,
        limit: u32,
    ) -> Result<Vec<AuditLogEntry>, Error> {
        self.provider.audit_log().recent_for_user(user_id, limit).await
    }
}
