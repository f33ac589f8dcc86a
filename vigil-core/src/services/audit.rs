use std::sync::Arc;

use crate::{
    Error,
    account::UserId,
    repositories::AuditLogRepository,
    storage::{AuditLogEntry, NewAuditLogEntry},
};

/// Service for the append-only audit trail.
///
/// Recording is best effort: a failed write is logged and swallowed so the
/// audit side channel can never fail an authentication request.
pub struct AuditService<L: AuditLogRepository> {
    audit_log_repository: Arc<L>,
}

impl<L: AuditLogRepository> AuditService<L> {
    pub fn new(audit_log_repository: Arc<L>) -> Self {
        Self {
            audit_log_repository,
        }
    }

    /// Append an entry, absorbing any storage failure.
    pub async fn record(&self, entry: NewAuditLogEntry) {
        let action = entry.action.clone();
        if let Err(e) = self.audit_log_repository.insert(entry).await {
            tracing::warn!(action = %action, error = %e, "Failed to write audit log entry");
        }
    }

    /// Most recent entries for a user, newest first.
    pub async fn trail(&self, user_id: &UserId, limit: u32) -> Result<Vec<AuditLogEntry>, Error> {
        self.audit_log_repository
            .recent_for_user(user_id, limit)
            .await
    }
}
