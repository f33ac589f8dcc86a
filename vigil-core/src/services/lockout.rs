use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::{
    Error,
    account::{Account, UserId},
    error::AuthError,
    repositories::AccountRepository,
    storage::LockoutConfig,
};

/// Service enforcing the failed-attempt lockout policy.
///
/// The lock check happens before password verification so a locked account
/// gives the same answer for right and wrong passwords.
pub struct LockoutService<A: AccountRepository> {
    account_repository: Arc<A>,
    config: LockoutConfig,
}

impl<A: AccountRepository> LockoutService<A> {
    pub fn new(account_repository: Arc<A>, config: LockoutConfig) -> Self {
        Self {
            account_repository,
            config,
        }
    }

    pub fn config(&self) -> &LockoutConfig {
        &self.config
    }

    /// Reject a login attempt against a currently locked account.
    pub fn check(&self, account: &Account, now: DateTime<Utc>) -> Result<(), Error> {
        if account.is_locked(now) {
            return Err(AuthError::AccountLocked.into());
        }
        Ok(())
    }

    /// Record a failed attempt. The repository increments the counter and
    /// applies the lock in one statement, so an attempt against an account
    /// already at the threshold re-arms the lock window.
    ///
    /// Returns the failed attempt count after the increment.
    pub async fn record_failure(&self, id: &UserId, now: DateTime<Utc>) -> Result<u32, Error> {
        let locked_until = now + self.config.lockout_duration;
        self.account_repository
            .record_login_failure(id, self.config.max_failed_attempts, locked_until)
            .await
    }

    /// Reset the counter and clear any lock after a full authentication.
    pub async fn record_success(&self, id: &UserId, now: DateTime<Utc>) -> Result<(), Error> {
        self.account_repository.record_login_success(id, now).await
    }
}
