use async_trait::async_trait;
use chrono::Utc;
use sqlx::SqlitePool;
use vigil_core::{
    Error, UserId,
    error::StorageError,
    repositories::FraudFlagRepository,
    storage::{FraudFlag, NewFraudFlag},
};

use crate::SqliteFraudFlag;

pub struct SqliteFraudFlagRepository {
    pool: SqlitePool,
}

impl SqliteFraudFlagRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl FraudFlagRepository for SqliteFraudFlagRepository {
    async fn insert(&self, flag: NewFraudFlag) -> Result<FraudFlag, Error> {
        let row = sqlx::query_as::<_, SqliteFraudFlag>(
            r#"
            INSERT INTO fraud_flags (id, user_id, reason, severity, ip, metadata, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            RETURNING *
            "#,
        )
        .bind(&flag.id)
        .bind(flag.user_id.as_str())
        .bind(&flag.reason)
        .bind(flag.severity as i64)
        .bind(&flag.ip)
        .bind(flag.metadata.to_string())
        .bind(Utc::now().timestamp())
        .fetch_one(&self.pool)
        .await
        .map_err(|e| Error::Storage(StorageError::Database(e.to_string())))?;

        Ok(row.into())
    }

    async fn recent(&self, user_id: &UserId, limit: u32) -> Result<Vec<FraudFlag>, Error> {
        let rows = sqlx::query_as::<_, SqliteFraudFlag>(
            r#"
            SELECT * FROM fraud_flags
            WHERE user_id = ?1
            ORDER BY created_at DESC, id DESC
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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing;
    use serde_json::json;
    use vigil_core::repositories::FraudFlagRepositoryProvider;

    #[tokio::test]
    async fn test_insert_and_recent() {
        let provider = testing::provider().await;
        let repo = provider.fraud_flag();
        let user_id = UserId::new_random();

        let flag = repo
            .insert(NewFraudFlag::new(
                user_id.clone(),
                "Multiple IP addresses detected",
                2,
                "203.0.113.1",
                json!({ "ips": ["203.0.113.1", "203.0.113.2"] }),
            ))
            .await
            .unwrap();
        assert!(flag.id.starts_with("flag_"));
        assert_eq!(flag.metadata["ips"].as_array().unwrap().len(), 2);

        repo.insert(NewFraudFlag::new(
            user_id.clone(),
            "Rapid successive login attempts",
            3,
            "203.0.113.1",
            json!({}),
        ))
        .await
        .unwrap();

        let flags = repo.recent(&user_id, 10).await.unwrap();
        assert_eq!(flags.len(), 2);
        assert_eq!(flags[0].reason, "Rapid successive login attempts");

        let limited = repo.recent(&user_id, 1).await.unwrap();
        assert_eq!(limited.len(), 1);
    }

    #[tokio::test]
    async fn test_severity_clamped_on_construction() {
        let provider = testing::provider().await;
        let repo = provider.fraud_flag();
        let user_id = UserId::new_random();

        let flag = repo
            .insert(NewFraudFlag::new(
                user_id.clone(),
                "out of range",
                9,
                "203.0.113.1",
                json!({}),
            ))
            .await
            .unwrap();

        assert_eq!(flag.severity, 5);
    }
}
