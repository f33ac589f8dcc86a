use async_trait::async_trait;

use crate::{
    Error,
    account::UserId,
    storage::{FraudFlag, NewFraudFlag},
};

/// Repository for fraud flags raised by the risk checks.
#[async_trait]
pub trait FraudFlagRepository: Send + Sync + 'static {
    /// Persist a new fraud flag
    async fn insert(&self, flag: NewFraudFlag) -> Result<FraudFlag, Error>;

    /// Most recent flags for a user, newest first
    async fn recent(&self, user_id: &UserId, limit: u32) -> Result<Vec<FraudFlag>, Error>;
}
