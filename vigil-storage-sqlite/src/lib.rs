//! SQLite storage backend
//!
//! Implements the vigil repository traits over a [`sqlx::SqlitePool`].
//! Timestamps are stored as unix seconds in INTEGER columns and JSON values
//! as TEXT; the `Sqlite*` row types handle the conversions both ways.

mod migrations;
pub mod repositories;

pub use repositories::SqliteRepositoryProvider;

use chrono::{DateTime, Utc};
use sqlx::prelude::FromRow;
use vigil_core::{
    Account, UserId,
    storage::{AuditLogEntry, AuditSeverity, FraudFlag, GeoProfile, LoginAttempt},
};

fn from_unix(secs: i64) -> DateTime<Utc> {
    DateTime::from_timestamp(secs, 0).unwrap_or_default()
}

#[derive(Debug, Clone, FromRow)]
pub(crate) struct SqliteAccount {
    id: String,
    email: String,
    #[allow(dead_code)]
    password_hash: Option<String>,
    mfa_secret: Option<String>,
    failed_attempts: i64,
    locked_until: Option<i64>,
    last_login_at: Option<i64>,
    created_at: i64,
    updated_at: i64,
}

impl From<SqliteAccount> for Account {
    fn from(row: SqliteAccount) -> Self {
        Account {
            id: UserId::new(&row.id),
            email: row.email,
            mfa_secret: row.mfa_secret,
            failed_attempts: row.failed_attempts as u32,
            locked_until: row.locked_until.map(from_unix),
            last_login_at: row.last_login_at.map(from_unix),
            created_at: from_unix(row.created_at),
            updated_at: from_unix(row.updated_at),
        }
    }
}

#[derive(Debug, Clone, FromRow)]
pub(crate) struct SqliteLoginAttempt {
    id: i64,
    user_id: Option<String>,
    ip: String,
    user_agent: Option<String>,
    success: bool,
    country_code: Option<String>,
    city: Option<String>,
    latitude: Option<f64>,
    longitude: Option<f64>,
    timestamp: i64,
}

impl From<SqliteLoginAttempt> for LoginAttempt {
    fn from(row: SqliteLoginAttempt) -> Self {
        LoginAttempt {
            id: row.id,
            user_id: row.user_id.map(|id| UserId::new(&id)),
            ip: row.ip,
            user_agent: row.user_agent,
            success: row.success,
            country_code: row.country_code,
            city: row.city,
            latitude: row.latitude,
            longitude: row.longitude,
            timestamp: from_unix(row.timestamp),
        }
    }
}

#[derive(Debug, Clone, FromRow)]
pub(crate) struct SqliteGeoProfile {
    id: i64,
    user_id: String,
    country_code: String,
    city: Option<String>,
    latitude: Option<f64>,
    longitude: Option<f64>,
    trusted: bool,
    login_count: i64,
    first_seen: i64,
    last_seen: i64,
}

impl From<SqliteGeoProfile> for GeoProfile {
    fn from(row: SqliteGeoProfile) -> Self {
        GeoProfile {
            id: row.id,
            user_id: UserId::new(&row.user_id),
            country_code: row.country_code,
            city: row.city,
            latitude: row.latitude,
            longitude: row.longitude,
            trusted: row.trusted,
            login_count: row.login_count as u32,
            first_seen: from_unix(row.first_seen),
            last_seen: from_unix(row.last_seen),
        }
    }
}

#[derive(Debug, Clone, FromRow)]
pub(crate) struct SqliteFraudFlag {
    id: String,
    user_id: String,
    reason: String,
    severity: i64,
    ip: String,
    metadata: String,
    created_at: i64,
}

impl From<SqliteFraudFlag> for FraudFlag {
    fn from(row: SqliteFraudFlag) -> Self {
        FraudFlag {
            id: row.id,
            user_id: UserId::new(&row.user_id),
            reason: row.reason,
            severity: row.severity as u8,
            ip: row.ip,
            metadata: serde_json::from_str(&row.metadata).unwrap_or(serde_json::Value::Null),
            detected_at: from_unix(row.created_at),
        }
    }
}

#[derive(Debug, Clone, FromRow)]
pub(crate) struct SqliteAuditLogEntry {
    id: i64,
    user_id: Option<String>,
    action: String,
    resource_type: String,
    resource_id: Option<String>,
    ip: String,
    user_agent: Option<String>,
    request_data: String,
    response_status: i64,
    severity: String,
    timestamp: i64,
}

impl From<SqliteAuditLogEntry> for AuditLogEntry {
    fn from(row: SqliteAuditLogEntry) -> Self {
        let severity = row
            .severity
            .parse()
            .unwrap_or_else(|_| AuditSeverity::for_action(&row.action));
        AuditLogEntry {
            id: row.id,
            user_id: row.user_id.map(|id| UserId::new(&id)),
            action: row.action,
            resource_type: row.resource_type,
            resource_id: row.resource_id,
            ip: row.ip,
            user_agent: row.user_agent,
            request_data: serde_json::from_str(&row.request_data)
                .unwrap_or(serde_json::Value::Null),
            response_status: row.response_status as u16,
            severity,
            timestamp: from_unix(row.timestamp),
        }
    }
}
