use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use vigil_core::{
    Error, UserId,
    error::StorageError,
    repositories::LoginAttemptRepository,
    storage::{LoginAttempt, NewLoginAttempt},
};

use crate::SqliteLoginAttempt;

pub struct SqliteLoginAttemptRepository {
    pool: SqlitePool,
}

impl SqliteLoginAttemptRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl LoginAttemptRepository for SqliteLoginAttemptRepository {
    async fn record(&self, attempt: NewLoginAttempt) -> Result<LoginAttempt, Error> {
        let row = sqlx::query_as::<_, SqliteLoginAttempt>(
            r#"
            INSERT INTO login_attempts
                (user_id, ip, user_agent, success, country_code, city, latitude, longitude, timestamp)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
            RETURNING *
            "#,
        )
        .bind(attempt.user_id.as_ref().map(|id| id.as_str().to_string()))
        .bind(&attempt.ip)
        .bind(&attempt.user_agent)
        .bind(attempt.success)
        .bind(&attempt.geolocation.country_code)
        .bind(&attempt.geolocation.city)
        .bind(attempt.geolocation.latitude)
        .bind(attempt.geolocation.longitude)
        .bind(Utc::now().timestamp())
        .fetch_one(&self.pool)
        .await
        .map_err(|e| Error::Storage(StorageError::Database(e.to_string())))?;

        Ok(row.into())
    }

    async fn count_failures_since(
        &self,
        user_id: &UserId,
        since: DateTime<Utc>,
    ) -> Result<u32, Error> {
        let count: i64 = sqlx::query_scalar(
            r#"
            SELECT COUNT(*) FROM login_attempts
            WHERE user_id = ?1 AND success = 0 AND timestamp >= ?2
            "#,
        )
        .bind(user_id.as_str())
        .bind(since.timestamp())
        .fetch_one(&self.pool)
        .await
        .map_err(|e| Error::Storage(StorageError::Database(e.to_string())))?;

        Ok(count as u32)
    }

    async fn count_successes_since(
        &self,
        user_id: &UserId,
        since: DateTime<Utc>,
    ) -> Result<u32, Error> {
        let count: i64 = sqlx::query_scalar(
            r#"
            SELECT COUNT(*) FROM login_attempts
            WHERE user_id = ?1 AND success = 1 AND timestamp >= ?2
            "#,
        )
        .bind(user_id.as_str())
        .bind(since.timestamp())
        .fetch_one(&self.pool)
        .await
        .map_err(|e| Error::Storage(StorageError::Database(e.to_string())))?;

        Ok(count as u32)
    }

    async fn distinct_success_ips_since(
        &self,
        user_id: &UserId,
        since: DateTime<Utc>,
    ) -> Result<Vec<String>, Error> {
        let ips: Vec<String> = sqlx::query_scalar(
            r#"
            SELECT DISTINCT ip FROM login_attempts
            WHERE user_id = ?1 AND success = 1 AND timestamp >= ?2
            ORDER BY ip
            "#,
        )
        .bind(user_id.as_str())
        .bind(since.timestamp())
        .fetch_all(&self.pool)
        .await
        .map_err(|e| Error::Storage(StorageError::Database(e.to_string())))?;

        Ok(ips)
    }

    async fn recent(&self, user_id: &UserId, limit: u32) -> Result<Vec<LoginAttempt>, Error> {
        let rows = sqlx::query_as::<_, SqliteLoginAttempt>(
            r#"
            SELECT * FROM login_attempts
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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing;
    use chrono::Duration;
    use vigil_core::{GeoLocation, repositories::LoginAttemptRepositoryProvider};

    fn attempt(user_id: &UserId, ip: &str, success: bool) -> NewLoginAttempt {
        NewLoginAttempt {
            user_id: Some(user_id.clone()),
            ip: ip.to_string(),
            user_agent: Some("test-agent".to_string()),
            success,
            geolocation: GeoLocation {
                ip: ip.to_string(),
                country_code: Some("US".to_string()),
                city: Some("New York".to_string()),
                latitude: Some(40.7128),
                longitude: Some(-74.0060),
                is_local: false,
            },
        }
    }

    #[tokio::test]
    async fn test_record_and_recent() {
        let provider = testing::provider().await;
        let repo = provider.login_attempt();
        let user_id = UserId::new_random();

        let recorded = repo.record(attempt(&user_id, "203.0.113.1", true)).await.unwrap();
        assert_eq!(recorded.country_code.as_deref(), Some("US"));
        repo.record(attempt(&user_id, "203.0.113.2", false)).await.unwrap();

        let recent = repo.recent(&user_id, 10).await.unwrap();
        assert_eq!(recent.len(), 2);
        // newest first
        assert_eq!(recent[0].ip, "203.0.113.2");
        assert!(!recent[0].success);
    }

    #[tokio::test]
    async fn test_window_counts() {
        let provider = testing::provider().await;
        let repo = provider.login_attempt();
        let user_id = UserId::new_random();
        let other = UserId::new_random();

        repo.record(attempt(&user_id, "203.0.113.1", false)).await.unwrap();
        repo.record(attempt(&user_id, "203.0.113.1", false)).await.unwrap();
        repo.record(attempt(&user_id, "203.0.113.1", true)).await.unwrap();
        repo.record(attempt(&other, "203.0.113.9", false)).await.unwrap();

        let since = Utc::now() - Duration::minutes(15);
        assert_eq!(repo.count_failures_since(&user_id, since).await.unwrap(), 2);
        assert_eq!(repo.count_successes_since(&user_id, since).await.unwrap(), 1);

        // attempts outside the window are not counted
        let future = Utc::now() + Duration::minutes(1);
        assert_eq!(repo.count_failures_since(&user_id, future).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_distinct_success_ips() {
        let provider = testing::provider().await;
        let repo = provider.login_attempt();
        let user_id = UserId::new_random();

        repo.record(attempt(&user_id, "203.0.113.1", true)).await.unwrap();
        repo.record(attempt(&user_id, "203.0.113.1", true)).await.unwrap();
        repo.record(attempt(&user_id, "203.0.113.2", true)).await.unwrap();
        // failures do not contribute
        repo.record(attempt(&user_id, "203.0.113.3", false)).await.unwrap();

        let since = Utc::now() - Duration::hours(1);
        let ips = repo.distinct_success_ips_since(&user_id, since).await.unwrap();
        assert_eq!(ips, vec!["203.0.113.1", "203.0.113.2"]);
    }

    #[tokio::test]
    async fn test_anonymous_attempt() {
        let provider = testing::provider().await;
        let repo = provider.login_attempt();

        let recorded = repo
            .record(NewLoginAttempt {
                user_id: None,
                ip: "203.0.113.1".to_string(),
                user_agent: None,
                success: false,
                geolocation: GeoLocation::unknown("203.0.113.1"),
            })
            .await
            .unwrap();

        assert!(recorded.user_id.is_none());
        assert!(recorded.country_code.is_none());
    }
}
