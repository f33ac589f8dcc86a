use async_trait::async_trait;
use chrono::Utc;
use sqlx::SqlitePool;
use vigil_core::{
    Error, UserId,
    error::StorageError,
    repositories::AuditLogRepository,
    storage::{AuditLogEntry, NewAuditLogEntry},
};

use crate::SqliteAuditLogEntry;

pub struct SqliteAuditLogRepository {
    pool: SqlitePool,
}

impl SqliteAuditLogRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl AuditLogRepository for SqliteAuditLogRepository {
    async fn insert(&self, entry: NewAuditLogEntry) -> Result<AuditLogEntry, Error> {
        let severity = entry.severity();

        let row = sqlx::query_as::<_, SqliteAuditLogEntry>(
            r#"
            INSERT INTO audit_logs
                (user_id, action, resource_type, resource_id, ip, user_agent,
                 request_data, response_status, severity, timestamp)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
            RETURNING *
            "#,
        )
        .bind(entry.user_id.as_ref().map(|id| id.as_str().to_string()))
        .bind(&entry.action)
        .bind(&entry.resource_type)
        .bind(&entry.resource_id)
        .bind(&entry.ip)
        .bind(&entry.user_agent)
        .bind(entry.request_data.to_string())
        .bind(entry.response_status as i64)
        .bind(severity.as_str())
        .bind(Utc::now().timestamp())
        .fetch_one(&self.pool)
        .await
        .map_err(|e| Error::Storage(StorageError::Database(e.to_string())))?;

        Ok(row.into())
    }

    async fn recent_for_user(
        &self,
        user_id: &UserId,
        limit: u32,
    ) -> Result<Vec<AuditLogEntry>, Error> {
        let rows = sqlx::query_as::<_, SqliteAuditLogEntry>(
            r#"
            SELECT * FROM audit_logs
            WHERE user_id = ?1
            ORDER BY timestamp DESC, id DESC
            LIMIT ?2
            "#,
        )
        .bind(user_id.as_str())
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| Error::Storage(StorageError::Database(e.to_string())))?;

        Ok(rows.into_iter().map(Into::into).collect())
    }
}
