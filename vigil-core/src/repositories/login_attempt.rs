use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::{
    Error,
    account::UserId,
    storage::{LoginAttempt, NewLoginAttempt},
};

/// Repository for the login attempt trail.
///
/// The fraud checks query this trail with sliding time windows, so every
/// query method takes an explicit `since` cutoff rather than a duration.
#[async_trait]
pub trait LoginAttemptRepository: Send + Sync + 'static {
    /// Record a login attempt
    async fn record(&self, attempt: NewLoginAttempt) -> Result<LoginAttempt, Error>;

    /// Count failed attempts for a user since `since`
    async fn count_failures_since(
        &self,
        user_id: &UserId,
        since: DateTime<Utc>,
    ) -> Result<u32, Error>;

    /// Count successful logins for a user since `since`
    async fn count_successes_since(
        &self,
        user_id: &UserId,
        since: DateTime<Utc>,
    ) -> Result<u32, Error>;

    /// Distinct source IPs of successful logins for a user since `since`
    async fn distinct_success_ips_since(
        &self,
        user_id: &UserId,
        since: DateTime<Utc>,
    ) -> Result<Vec<String>, Error>;

    /// Most recent attempts for a user, newest first
    async fn recent(&self, user_id: &UserId, limit: u32) -> Result<Vec<LoginAttempt>, Error>;
}
