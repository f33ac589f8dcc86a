//! Record and configuration types shared between services and repositories.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::account::UserId;
use crate::geo::GeoLocation;
use crate::id::generate_prefixed_id;

/// Lockout policy parameters.
///
/// Defaults to the production policy: five consecutive failures lock the
/// account for thirty minutes.
#[derive(Debug, Clone)]
pub struct LockoutConfig {
    /// Number of consecutive failed password verifications that locks the
    /// account.
    pub max_failed_attempts: u32,

    /// How long the account stays locked once the threshold is reached.
    pub lockout_duration: Duration,
}

impl Default for LockoutConfig {
    fn default() -> Self {
        Self {
            max_failed_attempts: 5,
            lockout_duration: Duration::minutes(30),
        }
    }
}

/// A login attempt to be recorded. `user_id` is `None` for attempts against
/// unknown accounts, which are kept for fraud analytics all the same.
#[derive(Debug, Clone)]
pub struct NewLoginAttempt {
    pub user_id: Option<UserId>,
    pub ip: String,
    pub user_agent: Option<String>,
    pub success: bool,
    pub geolocation: GeoLocation,
}

/// A recorded login attempt. Immutable once written.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginAttempt {
    pub id: i64,
    pub user_id: Option<UserId>,
    pub ip: String,
    pub user_agent: Option<String>,
    pub success: bool,
    pub country_code: Option<String>,
    pub city: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub timestamp: DateTime<Utc>,
}

/// A per-user geolocation trust profile, one row per
/// (user, country_code, city).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeoProfile {
    pub id: i64,
    pub user_id: UserId,
    pub country_code: String,
    pub city: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub trusted: bool,
    pub login_count: u32,
    pub first_seen: DateTime<Utc>,
    pub last_seen: DateTime<Utc>,
}

/// Fraud flag severity bounds.
pub const MIN_FLAG_SEVERITY: u8 = 1;
pub const MAX_FLAG_SEVERITY: u8 = 5;

/// A fraud flag to be raised against an account.
#[derive(Debug, Clone)]
pub struct NewFraudFlag {
    pub id: String,
    pub user_id: UserId,
    pub reason: String,
    pub severity: u8,
    pub ip: String,
    pub metadata: Value,
}

impl NewFraudFlag {
    /// Severity is clamped into the valid `[1, 5]` range.
    pub fn new(
        user_id: UserId,
        reason: impl Into<String>,
        severity: u8,
        ip: impl Into<String>,
        metadata: Value,
    ) -> Self {
        Self {
            id: generate_prefixed_id("flag"),
            user_id,
            reason: reason.into(),
            severity: severity.clamp(MIN_FLAG_SEVERITY, MAX_FLAG_SEVERITY),
            ip: ip.into(),
            metadata,
        }
    }
}

/// A persisted fraud flag. Append-only.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FraudFlag {
    pub id: String,
    pub user_id: UserId,
    pub reason: String,
    pub severity: u8,
    pub ip: String,
    pub metadata: Value,
    pub detected_at: DateTime<Utc>,
}

/// Audit log severity, derived from the action name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AuditSeverity {
    Info,
    Warn,
    Error,
}

impl AuditSeverity {
    /// Substring classification of the action name: FAILED/FRAUD/ERROR are
    /// warnings, SECURITY/BREACH are errors, everything else informational.
    pub fn for_action(action: &str) -> Self {
        if action.contains("SECURITY") || action.contains("BREACH") {
            return AuditSeverity::Error;
        }
        if action.contains("FAILED") || action.contains("FRAUD") || action.contains("ERROR") {
            return AuditSeverity::Warn;
        }
        AuditSeverity::Info
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            AuditSeverity::Info => "INFO",
            AuditSeverity::Warn => "WARN",
            AuditSeverity::Error => "ERROR",
        }
    }
}

impl std::str::FromStr for AuditSeverity {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "INFO" => Ok(AuditSeverity::Info),
            "WARN" => Ok(AuditSeverity::Warn),
            "ERROR" => Ok(AuditSeverity::Error),
            other => Err(format!("unknown audit severity: {other}")),
        }
    }
}

/// An audit trail entry to be appended. Compliance record, never mutated.
#[derive(Debug, Clone)]
pub struct NewAuditLogEntry {
    pub user_id: Option<UserId>,
    pub action: String,
    pub resource_type: String,
    pub resource_id: Option<String>,
    pub ip: String,
    pub user_agent: Option<String>,
    pub request_data: Value,
    pub response_status: u16,
}

#[allow(clippy::too_many_arguments)]
impl NewAuditLogEntry {
    pub fn new(
        user_id: Option<UserId>,
        action: impl Into<String>,
        resource_type: impl Into<String>,
        resource_id: Option<String>,
        ip: impl Into<String>,
        user_agent: Option<String>,
        request_data: Value,
        response_status: u16,
    ) -> Self {
        Self {
            user_id,
            action: action.into(),
            resource_type: resource_type.into(),
            resource_id,
            ip: ip.into(),
            user_agent,
            request_data,
            response_status,
        }
    }

    /// Severity derived from the action name.
    pub fn severity(&self) -> AuditSeverity {
        AuditSeverity::for_action(&self.action)
    }
}

/// A persisted audit trail entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditLogEntry {
    pub id: i64,
    pub user_id: Option<UserId>,
    pub action: String,
    pub resource_type: String,
    pub resource_id: Option<String>,
    pub ip: String,
    pub user_agent: Option<String>,
    pub request_data: Value,
    pub response_status: u16,
    pub severity: AuditSeverity,
    pub timestamp: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_severity_classification() {
        assert_eq!(AuditSeverity::for_action("LOGIN_SUCCESS"), AuditSeverity::Info);
        assert_eq!(AuditSeverity::for_action("LOGIN_FAILED"), AuditSeverity::Warn);
        assert_eq!(AuditSeverity::for_action("FRAUD_FLAGGED"), AuditSeverity::Warn);
        assert_eq!(
            AuditSeverity::for_action("FRAUD_DETECTION_ERROR"),
            AuditSeverity::Warn
        );
        assert_eq!(
            AuditSeverity::for_action("MFA_SECURITY_MISMATCH"),
            AuditSeverity::Error
        );
        assert_eq!(
            AuditSeverity::for_action("DATA_BREACH_SUSPECTED"),
            AuditSeverity::Error
        );
    }

    #[test]
    fn test_severity_round_trip() {
        for severity in [AuditSeverity::Info, AuditSeverity::Warn, AuditSeverity::Error] {
            assert_eq!(severity.as_str().parse::<AuditSeverity>().unwrap(), severity);
        }
        assert!("DEBUG".parse::<AuditSeverity>().is_err());
    }

    #[test]
    fn test_fraud_flag_severity_clamped() {
        let user = UserId::new_random();
        let flag = NewFraudFlag::new(user.clone(), "test", 9, "1.2.3.4", json!({}));
        assert_eq!(flag.severity, MAX_FLAG_SEVERITY);

        let flag = NewFraudFlag::new(user, "test", 0, "1.2.3.4", json!({}));
        assert_eq!(flag.severity, MIN_FLAG_SEVERITY);
    }

    #[test]
    fn test_fraud_flag_id_prefix() {
        let flag = NewFraudFlag::new(UserId::new_random(), "test", 3, "1.2.3.4", json!({}));
        assert!(flag.id.starts_with("flag_"));
    }

    #[test]
    fn test_default_lockout_config() {
        let config = LockoutConfig::default();
        assert_eq!(config.max_failed_attempts, 5);
        assert_eq!(config.lockout_duration, Duration::minutes(30));
    }
}
