use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::{
    Error,
    account::{Account, NewAccount, UserId},
};

/// Repository for account records and their lockout counters.
#[async_trait]
pub trait AccountRepository: Send + Sync + 'static {
    /// Create a new account
    async fn create(&self, account: NewAccount) -> Result<Account, Error>;

    /// Find an account by ID
    async fn find_by_id(&self, id: &UserId) -> Result<Option<Account>, Error>;

    /// Find an account by email
    async fn find_by_email(&self, email: &str) -> Result<Option<Account>, Error>;

    /// Record one more failed login attempt, locking the account until
    /// `locked_until` when the new count reaches `threshold`.
    ///
    /// The increment and the lock decision happen in a single statement so
    /// concurrent failures cannot skip past the threshold. Returns the
    /// failed attempt count after the increment.
    async fn record_login_failure(
        &self,
        id: &UserId,
        threshold: u32,
        locked_until: DateTime<Utc>,
    ) -> Result<u32, Error>;

    /// Reset the failure counter, clear any lock and stamp the last login.
    async fn record_login_success(&self, id: &UserId, now: DateTime<Utc>) -> Result<(), Error>;

    /// Store the TOTP secret, enrolling the account in MFA
    async fn set_mfa_secret(&self, id: &UserId, secret: &str) -> Result<(), Error>;
}
