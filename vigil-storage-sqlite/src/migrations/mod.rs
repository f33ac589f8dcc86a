//! Schema migrations, applied in version order inside transactions.

use async_trait::async_trait;
use chrono::Utc;
use sqlx::{Database, Sqlite, SqlitePool};

const MIGRATION_TABLE: &str = "_vigil_migrations";

#[async_trait]
pub(crate) trait Migration: Send + Sync {
    fn version(&self) -> i64;
    fn name(&self) -> &str;
    async fn up<'a>(
        &'a self,
        conn: &'a mut <Sqlite as Database>::Connection,
    ) -> Result<(), sqlx::Error>;
}

pub(crate) fn all_migrations() -> Vec<Box<dyn Migration>> {
    vec![
        Box::new(CreateAccountsTable),
        Box::new(CreateLoginAttemptsTable),
        Box::new(CreateGeoProfilesTable),
        Box::new(CreateFraudFlagsTable),
        Box::new(CreateAuditLogsTable),
        Box::new(CreateIndexes),
    ]
}

pub(crate) struct SqliteMigrationManager {
    pool: SqlitePool,
}

impl SqliteMigrationManager {
    pub(crate) fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub(crate) async fn initialize(&self) -> Result<(), sqlx::Error> {
        sqlx::query(
            format!(
                r#"
            CREATE TABLE IF NOT EXISTS {MIGRATION_TABLE} (
                version INTEGER PRIMARY KEY,
                name TEXT NOT NULL,
                applied_at INTEGER NOT NULL DEFAULT (unixepoch())
            );"#
            )
            .as_str(),
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    pub(crate) async fn up(&self, migrations: &[Box<dyn Migration>]) -> Result<(), sqlx::Error> {
        for migration in migrations {
            if !self.is_applied(migration.version()).await? {
                let mut tx = self.pool.begin().await?;

                tracing::info!(
                    "Applying migration {} ({})",
                    migration.name(),
                    migration.version()
                );

                migration
                    .up(&mut *tx as &mut <Sqlite as Database>::Connection)
                    .await?;

                sqlx::query(
                    format!(
                        "INSERT INTO {MIGRATION_TABLE} (version, name, applied_at) VALUES (?, ?, ?)"
                    )
                    .as_str(),
                )
                .bind(migration.version())
                .bind(migration.name())
                .bind(Utc::now().timestamp())
                .execute(&mut *tx)
                .await?;

                tx.commit().await?;
            }
        }
        Ok(())
    }

    async fn is_applied(&self, version: i64) -> Result<bool, sqlx::Error> {
        let applied: bool = sqlx::query_scalar(
            format!("SELECT EXISTS(SELECT 1 FROM {MIGRATION_TABLE} WHERE version = ?)").as_str(),
        )
        .bind(version)
        .fetch_one(&self.pool)
        .await?;
        Ok(applied)
    }
}

struct CreateAccountsTable;

#[async_trait]
impl Migration for CreateAccountsTable {
    fn version(&self) -> i64 {
        1
    }

    fn name(&self) -> &str {
        "CreateAccountsTable"
    }

    async fn up<'a>(
        &'a self,
        conn: &'a mut <Sqlite as Database>::Connection,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS accounts (
                id TEXT PRIMARY KEY,
                email TEXT NOT NULL,
                password_hash TEXT,
                mfa_secret TEXT,
                failed_attempts INTEGER NOT NULL DEFAULT 0,
                locked_until INTEGER,
                last_login_at INTEGER,
                created_at INTEGER NOT NULL DEFAULT (unixepoch()),
                updated_at INTEGER NOT NULL DEFAULT (unixepoch()),
                UNIQUE(email)
            );"#,
        )
        .execute(conn)
        .await?;
        Ok(())
    }
}

struct CreateLoginAttemptsTable;

#[async_trait]
impl Migration for CreateLoginAttemptsTable {
    fn version(&self) -> i64 {
        2
    }

    fn name(&self) -> &str {
        "CreateLoginAttemptsTable"
    }

    async fn up<'a>(
        &'a self,
        conn: &'a mut <Sqlite as Database>::Connection,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS login_attempts (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                user_id TEXT,
                ip TEXT NOT NULL,
                user_agent TEXT,
                success INTEGER NOT NULL,
                country_code TEXT,
                city TEXT,
                latitude REAL,
                longitude REAL,
                timestamp INTEGER NOT NULL DEFAULT (unixepoch())
            );"#,
        )
        .execute(conn)
        .await?;
        Ok(())
    }
}

struct CreateGeoProfilesTable;

#[async_trait]
impl Migration for CreateGeoProfilesTable {
    fn version(&self) -> i64 {
        3
    }

    fn name(&self) -> &str {
        "CreateGeoProfilesTable"
    }

    async fn up<'a>(
        &'a self,
        conn: &'a mut <Sqlite as Database>::Connection,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS geo_profiles (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                user_id TEXT NOT NULL,
                country_code TEXT NOT NULL,
                city TEXT,
                latitude REAL,
                longitude REAL,
                trusted INTEGER NOT NULL DEFAULT 0,
                login_count INTEGER NOT NULL DEFAULT 1,
                first_seen INTEGER NOT NULL DEFAULT (unixepoch()),
                last_seen INTEGER NOT NULL DEFAULT (unixepoch()),
                UNIQUE(user_id, country_code, city)
            );"#,
        )
        .execute(conn)
        .await?;
        Ok(())
    }
}

struct CreateFraudFlagsTable;

#[async_trait]
impl Migration for CreateFraudFlagsTable {
    fn version(&self) -> i64 {
        4
    }

    fn name(&self) -> &str {
        "CreateFraudFlagsTable"
    }

    async fn up<'a>(
        &'a self,
        conn: &'a mut <Sqlite as Database>::Connection,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS fraud_flags (
                id TEXT PRIMARY KEY,
                user_id TEXT NOT NULL,
                reason TEXT NOT NULL,
                severity INTEGER NOT NULL,
                ip TEXT NOT NULL,
                metadata TEXT NOT NULL DEFAULT '{}',
                created_at INTEGER NOT NULL DEFAULT (unixepoch())
            );"#,
        )
        .execute(conn)
        .await?;
        Ok(())
    }
}

struct CreateAuditLogsTable;

#[async_trait]
impl Migration for CreateAuditLogsTable {
    fn version(&self) -> i64 {
        5
    }

    fn name(&self) -> &str {
        "CreateAuditLogsTable"
    }

    async fn up<'a>(
        &'a self,
        conn: &'a mut <Sqlite as Database>::Connection,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS audit_logs (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                user_id TEXT,
                action TEXT NOT NULL,
                resource_type TEXT NOT NULL,
                resource_id TEXT,
                ip TEXT NOT NULL,
                user_agent TEXT,
                request_data TEXT NOT NULL DEFAULT '{}',
                response_status INTEGER NOT NULL,
                severity TEXT NOT NULL,
                timestamp INTEGER NOT NULL DEFAULT (unixepoch())
            );"#,
        )
        .execute(conn)
        .await?;
        Ok(())
    }
}

struct CreateIndexes;

#[async_trait]
impl Migration for CreateIndexes {
    fn version(&self) -> i64 {
        6
    }

    fn name(&self) -> &str {
        "CreateIndexes"
    }

    async fn up<'a>(
        &'a self,
        conn: &'a mut <Sqlite as Database>::Connection,
    ) -> Result<(), sqlx::Error> {
        let indexes = [
            "CREATE INDEX IF NOT EXISTS idx_login_attempts_user_time ON login_attempts(user_id, timestamp)",
            "CREATE INDEX IF NOT EXISTS idx_geo_profiles_user ON geo_profiles(user_id)",
            "CREATE INDEX IF NOT EXISTS idx_fraud_flags_user ON fraud_flags(user_id, created_at)",
            "CREATE INDEX IF NOT EXISTS idx_audit_logs_user_time ON audit_logs(user_id, timestamp)",
        ];
        for index in indexes {
            sqlx::query(index).execute(&mut *conn).await?;
        }
        Ok(())
    }
}
