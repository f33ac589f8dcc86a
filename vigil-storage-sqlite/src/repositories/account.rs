use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use vigil_core::{
    Account, Error, NewAccount, UserId, error::StorageError,
    repositories::AccountRepository,
};

use crate::SqliteAccount;

pub struct SqliteAccountRepository {
    pool: SqlitePool,
}

impl SqliteAccountRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl AccountRepository for SqliteAccountRepository {
    async fn create(&self, account: NewAccount) -> Result<Account, Error> {
        let now = Utc::now().timestamp();

        let row = sqlx::query_as::<_, SqliteAccount>(
            r#"
            INSERT INTO accounts (id, email, created_at, updated_at)
            VALUES (?1, ?2, ?3, ?4)
            RETURNING *
            "#,
        )
        .bind(account.id.as_str())
        .bind(&account.email)
        .bind(now)
        .bind(now)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| match &e {
            sqlx::Error::Database(db) if db.is_unique_violation() => {
                Error::Storage(StorageError::Constraint(format!(
                    "Account already exists: {}",
                    account.email
                )))
            }
            _ => Error::Storage(StorageError::Database(e.to_string())),
        })?;

        Ok(row.into())
    }

    async fn find_by_id(&self, id: &UserId) -> Result<Option<Account>, Error> {
        let row = sqlx::query_as::<_, SqliteAccount>("SELECT * FROM accounts WHERE id = ?1")
            .bind(id.as_str())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| Error::Storage(StorageError::Database(e.to_string())))?;

        Ok(row.map(|a| a.into()))
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<Account>, Error> {
        let row = sqlx::query_as::<_, SqliteAccount>("SELECT * FROM accounts WHERE email = ?1")
            .bind(email)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| Error::Storage(StorageError::Database(e.to_string())))?;

        Ok(row.map(|a| a.into()))
    }

    async fn record_login_failure(
        &self,
        id: &UserId,
        threshold: u32,
        locked_until: DateTime<Utc>,
    ) -> Result<u32, Error> {
        // increment and lock decision in one statement, so two concurrent
        // failures cannot both observe a pre-threshold count
        let failed_attempts: i64 = sqlx::query_scalar(
            r#"
            UPDATE accounts
            SET failed_attempts = failed_attempts + 1,
                locked_until = CASE
                    WHEN failed_attempts + 1 >= ?1 THEN ?2
                    ELSE locked_until
                END,
                updated_at = ?3
            WHERE id = ?4
            RETURNING failed_attempts
            "#,
        )
        .bind(threshold as i64)
        .bind(locked_until.timestamp())
        .bind(Utc::now().timestamp())
        .bind(id.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| Error::Storage(StorageError::Database(e.to_string())))?
        .ok_or(Error::Storage(StorageError::NotFound))?;

        Ok(failed_attempts as u32)
    }

    async fn record_login_success(&self, id: &UserId, now: DateTime<Utc>) -> Result<(), Error> {
        let result = sqlx::query(
            r#"
            UPDATE accounts
            SET failed_attempts = 0,
                locked_until = NULL,
                last_login_at = ?1,
                updated_at = ?2
            WHERE id = ?3
            "#,
        )
        .bind(now.timestamp())
        .bind(Utc::now().timestamp())
        .bind(id.as_str())
        .execute(&self.pool)
        .await
        .map_err(|e| Error::Storage(StorageError::Database(e.to_string())))?;

        if result.rows_affected() == 0 {
            return Err(StorageError::NotFound.into());
        }

        Ok(())
    }

    async fn set_mfa_secret(&self, id: &UserId, secret: &str) -> Result<(), Error> {
        let result = sqlx::query("UPDATE accounts SET mfa_secret = ?1, updated_at = ?2 WHERE id = ?3")
            .bind(secret)
            .bind(Utc::now().timestamp())
            .bind(id.as_str())
            .execute(&self.pool)
            .await
            .map_err(|e| Error::Storage(StorageError::Database(e.to_string())))?;

        if result.rows_affected() == 0 {
            return Err(StorageError::NotFound.into());
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing;
    use chrono::Duration;
    use vigil_core::repositories::AccountRepositoryProvider;

    #[tokio::test]
    async fn test_create_and_find() {
        let provider = testing::provider().await;
        let repo = provider.account();

        let created = repo
            .create(NewAccount::new("user@example.com"))
            .await
            .unwrap();
        assert_eq!(created.failed_attempts, 0);
        assert!(!created.mfa_enabled());

        let by_id = repo.find_by_id(&created.id).await.unwrap().unwrap();
        assert_eq!(by_id.email, "user@example.com");

        let by_email = repo.find_by_email("user@example.com").await.unwrap().unwrap();
        assert_eq!(by_email.id, created.id);

        assert!(repo.find_by_email("other@example.com").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_duplicate_email_is_constraint_violation() {
        let provider = testing::provider().await;
        let repo = provider.account();

        repo.create(NewAccount::new("user@example.com"))
            .await
            .unwrap();
        let result = repo.create(NewAccount::new("user@example.com")).await;

        assert!(matches!(
            result,
            Err(Error::Storage(StorageError::Constraint(_)))
        ));
    }

    #[tokio::test]
    async fn test_failure_counter_locks_at_threshold() {
        let provider = testing::provider().await;
        let repo = provider.account();
        let account = repo
            .create(NewAccount::new("user@example.com"))
            .await
            .unwrap();
        let locked_until = Utc::now() + Duration::minutes(30);

        for expected in 1..=4u32 {
            let count = repo
                .record_login_failure(&account.id, 5, locked_until)
                .await
                .unwrap();
            assert_eq!(count, expected);
        }
        let account_row = repo.find_by_id(&account.id).await.unwrap().unwrap();
        assert!(account_row.locked_until.is_none());

        let count = repo
            .record_login_failure(&account.id, 5, locked_until)
            .await
            .unwrap();
        assert_eq!(count, 5);

        let account_row = repo.find_by_id(&account.id).await.unwrap().unwrap();
        // second precision from the unix timestamp column
        assert_eq!(
            account_row.locked_until.map(|t| t.timestamp()),
            Some(locked_until.timestamp())
        );
    }

    #[tokio::test]
    async fn test_success_clears_failures_and_lock() {
        let provider = testing::provider().await;
        let repo = provider.account();
        let account = repo
            .create(NewAccount::new("user@example.com"))
            .await
            .unwrap();

        for _ in 0..5 {
            repo.record_login_failure(&account.id, 5, Utc::now() + Duration::minutes(30))
                .await
                .unwrap();
        }

        let now = Utc::now();
        repo.record_login_success(&account.id, now).await.unwrap();

        let account_row = repo.find_by_id(&account.id).await.unwrap().unwrap();
        assert_eq!(account_row.failed_attempts, 0);
        assert!(account_row.locked_until.is_none());
        assert_eq!(
            account_row.last_login_at.map(|t| t.timestamp()),
            Some(now.timestamp())
        );
    }

    #[tokio::test]
    async fn test_set_mfa_secret() {
        let provider = testing::provider().await;
        let repo = provider.account();
        let account = repo
            .create(NewAccount::new("user@example.com"))
            .await
            .unwrap();

        repo.set_mfa_secret(&account.id, "JBSWY3DPEHPK3PXP")
            .await
            .unwrap();

        let account_row = repo.find_by_id(&account.id).await.unwrap().unwrap();
        assert_eq!(account_row.mfa_secret.as_deref(), Some("JBSWY3DPEHPK3PXP"));
        assert!(account_row.mfa_enabled());

        let missing = UserId::new("usr_does_not_exist");
        assert!(matches!(
            repo.set_mfa_secret(&missing, "x").await,
            Err(Error::Storage(StorageError::NotFound))
        ));
    }
}
