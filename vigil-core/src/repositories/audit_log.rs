use async_trait::async_trait;

use crate::{
    Error,
    account::UserId,
    storage::{AuditLogEntry, NewAuditLogEntry},
};

/// Repository for the append-only audit trail.
#[async_trait]
pub trait AuditLogRepository: Send + Sync + 'static {
    /// Append an audit log entry
    async fn insert(&self, entry: NewAuditLogEntry) -> Result<AuditLogEntry, Error>;

    /// Most recent entries for a user, newest first
    async fn recent_for_user(
        &self,
        user_id: &UserId,
        limit: u32,
    ) -> Result<Vec<AuditLogEntry>, Error>;
}
