//! Post-login fraud risk checks
//!
//! The engine runs after the authentication outcome is already decided and
//! must never change it: every failure in here is logged, audited and
//! absorbed. On success the four checks run concurrently over the login
//! attempt trail and the user's location profiles.

use std::sync::Arc;

use chrono::{Duration, Utc};
use serde_json::json;

use crate::{
    Error,
    account::UserId,
    geo::{GeoLocation, GeolocationResolver, haversine_km},
    repositories::{
        AuditLogRepository, FraudFlagRepository, GeoProfileRepository, LoginAttemptRepository,
        RepositoryProvider,
    },
    storage::{FraudFlag, LoginAttempt, NewAuditLogEntry, NewFraudFlag, NewLoginAttempt},
};

/// Thresholds and windows for the risk checks.
#[derive(Debug, Clone)]
pub struct FraudConfig {
    /// Window for the failed-attempt check
    pub failed_window: Duration,
    /// Failed attempts within the window that raise a flag
    pub failed_threshold: u32,
    /// Window for the distinct-IP check
    pub multi_ip_window: Duration,
    /// Distinct IPs above this count raise a flag
    pub multi_ip_threshold: usize,
    /// Window for the rapid-login check
    pub rapid_window: Duration,
    /// Successful logins above this count raise a flag
    pub rapid_threshold: u32,
    /// Distance from every trusted location that raises a flag
    pub distance_flag_km: f64,
    /// Distance that escalates the location flag to high severity
    pub distance_high_km: f64,
    /// Upper bound on the geolocation lookup before degrading to unknown
    pub geo_timeout: std::time::Duration,
}

impl Default for FraudConfig {
    fn default() -> Self {
        Self {
            failed_window: Duration::minutes(15),
            failed_threshold: 3,
            multi_ip_window: Duration::hours(1),
            multi_ip_threshold: 2,
            rapid_window: Duration::minutes(5),
            rapid_threshold: 5,
            distance_flag_km: 1000.0,
            distance_high_km: 5000.0,
            geo_timeout: std::time::Duration::from_secs(5),
        }
    }
}

const SEVERITY_FAILED_ATTEMPTS: u8 = 3;
const SEVERITY_MULTIPLE_IPS: u8 = 2;
const SEVERITY_RAPID_LOGINS: u8 = 3;
const SEVERITY_UNUSUAL_LOCATION: u8 = 2;
const SEVERITY_UNUSUAL_LOCATION_FAR: u8 = 4;

/// Engine that records login attempts and evaluates the fraud risk checks.
pub struct FraudEngine<R: RepositoryProvider> {
    provider: Arc<R>,
    resolver: Arc<dyn GeolocationResolver>,
    config: FraudConfig,
}

impl<R: RepositoryProvider> FraudEngine<R> {
    pub fn new(provider: Arc<R>, resolver: Arc<dyn GeolocationResolver>) -> Self {
        Self {
            provider,
            resolver,
            config: FraudConfig::default(),
        }
    }

    pub fn with_config(mut self, config: FraudConfig) -> Self {
        self.config = config;
        self
    }

    /// Record a login attempt and run the risk checks for it.
    ///
    /// Infallible by contract: any error inside is audited as a detection
    /// error and absorbed.
    pub async fn evaluate(
        &self,
        user_id: Option<&UserId>,
        ip: &str,
        user_agent: Option<&str>,
        success: bool,
    ) {
        if let Err(e) = self.evaluate_inner(user_id, ip, user_agent, success).await {
            tracing::error!(ip = %ip, error = %e, "Fraud evaluation failed");
            self.audit(NewAuditLogEntry::new(
                user_id.cloned(),
                "FRAUD_DETECTION_ERROR",
                "fraud",
                None,
                ip,
                user_agent.map(str::to_string),
                json!({ "error": e.to_string() }),
                500,
            ))
            .await;
        }
    }

    async fn evaluate_inner(
        &self,
        user_id: Option<&UserId>,
        ip: &str,
        user_agent: Option<&str>,
        success: bool,
    ) -> Result<(), Error> {
        let location = self.resolve_location(ip).await;

        self.provider
            .login_attempt()
            .record(NewLoginAttempt {
                user_id: user_id.cloned(),
                ip: ip.to_string(),
                user_agent: user_agent.map(str::to_string),
                success,
                geolocation: location.clone(),
            })
            .await?;

        let Some(user_id) = user_id else {
            // attempt against an unknown email, nothing to profile
            return Ok(());
        };

        if !success {
            return self.check_failed_attempts(user_id, ip).await;
        }

        // independent checks over the freshly extended trail
        let (multi_ip, unusual, rapid, visit) = tokio::join!(
            self.check_multiple_ips(user_id, ip),
            self.check_unusual_location(user_id, ip, &location),
            self.check_rapid_logins(user_id, ip),
            self.update_geo_profile(user_id, &location),
        );

        for (check, result) in [
            ("multiple_ips", multi_ip),
            ("unusual_location", unusual),
            ("rapid_logins", rapid),
            ("geo_profile", visit),
        ] {
            if let Err(e) = result {
                tracing::warn!(check = check, user_id = %user_id, error = %e, "Fraud check failed");
            }
        }

        Ok(())
    }

    /// Geolocation with a hard deadline; past it the attempt is recorded
    /// with an unknown location.
    async fn resolve_location(&self, ip: &str) -> GeoLocation {
        match tokio::time::timeout(self.config.geo_timeout, self.resolver.resolve(ip)).await {
            Ok(Ok(location)) => location,
            Ok(Err(e)) => {
                tracing::warn!(ip = %ip, error = %e, "Geolocation failed");
                GeoLocation::unknown(ip)
            }
            Err(_) => {
                tracing::warn!(ip = %ip, "Geolocation timed out");
                GeoLocation::unknown(ip)
            }
        }
    }

    async fn check_failed_attempts(&self, user_id: &UserId, ip: &str) -> Result<(), Error> {
        let since = Utc::now() - self.config.failed_window;
        let failures = self
            .provider
            .login_attempt()
            .count_failures_since(user_id, since)
            .await?;

        if failures >= self.config.failed_threshold {
            self.flag(NewFraudFlag::new(
                user_id.clone(),
                "Multiple failed login attempts",
                SEVERITY_FAILED_ATTEMPTS,
                ip,
                json!({ "failed_count": failures }),
            ))
            .await;
        }

        Ok(())
    }

    async fn check_multiple_ips(&self, user_id: &UserId, ip: &str) -> Result<(), Error> {
        let since = Utc::now() - self.config.multi_ip_window;
        let ips = self
            .provider
            .login_attempt()
            .distinct_success_ips_since(user_id, since)
            .await?;

        if ips.len() > self.config.multi_ip_threshold {
            self.flag(NewFraudFlag::new(
                user_id.clone(),
                "Multiple IP addresses detected",
                SEVERITY_MULTIPLE_IPS,
                ip,
                json!({ "ips": ips }),
            ))
            .await;
        }

        Ok(())
    }

    async fn check_rapid_logins(&self, user_id: &UserId, ip: &str) -> Result<(), Error> {
        let since = Utc::now() - self.config.rapid_window;
        let successes = self
            .provider
            .login_attempt()
            .count_successes_since(user_id, since)
            .await?;

        if successes > self.config.rapid_threshold {
            self.flag(NewFraudFlag::new(
                user_id.clone(),
                "Rapid successive login attempts",
                SEVERITY_RAPID_LOGINS,
                ip,
                json!({ "login_count": successes }),
            ))
            .await;
        }

        Ok(())
    }

    /// Compare the current location against the user's trusted profiles.
    ///
    /// Read-only: profile creation and trust promotion happen in
    /// `record_visit`, so this check cannot race its own writes.
    async fn check_unusual_location(
        &self,
        user_id: &UserId,
        ip: &str,
        location: &GeoLocation,
    ) -> Result<(), Error> {
        let Some(country) = location.country_code.as_deref() else {
            // local or unresolved address, nothing to compare
            return Ok(());
        };

        let trusted = self.provider.geo_profile().trusted_profiles(user_id).await?;
        if trusted.is_empty() {
            // first location becomes the trusted baseline
            return Ok(());
        }

        let known = trusted
            .iter()
            .any(|p| p.country_code == country && p.city.as_deref() == location.city.as_deref());
        if known {
            return Ok(());
        }

        // distance to the nearest trusted location, when both sides have
        // coordinates
        let min_distance_km = match (location.latitude, location.longitude) {
            (Some(lat), Some(lon)) => trusted
                .iter()
                .filter_map(|p| Some(haversine_km(lat, lon, p.latitude?, p.longitude?)))
                .fold(None::<f64>, |min, d| {
                    Some(min.map_or(d, |m| m.min(d)))
                }),
            _ => None,
        };

        let flag_it = match min_distance_km {
            Some(d) => d > self.config.distance_flag_km,
            // unknown distance from an unknown country is suspicious enough
            None => true,
        };

        if flag_it {
            let severity = match min_distance_km {
                Some(d) if d > self.config.distance_high_km => SEVERITY_UNUSUAL_LOCATION_FAR,
                _ => SEVERITY_UNUSUAL_LOCATION,
            };
            let city = location.city.as_deref().unwrap_or("Unknown");
            self.flag(NewFraudFlag::new(
                user_id.clone(),
                format!("Unusual geolocation: {city}, {country}"),
                severity,
                ip,
                json!({
                    "country_code": country,
                    "city": location.city,
                    "distance_km": min_distance_km,
                }),
            ))
            .await;
        }

        Ok(())
    }

    /// Extend the user's location history. Locations without a country
    /// (local or unresolved addresses) have nothing to profile.
    async fn update_geo_profile(&self, user_id: &UserId, location: &GeoLocation) -> Result<(), Error> {
        if location.country_code.is_none() {
            return Ok(());
        }
        self.provider
            .geo_profile()
            .record_visit(user_id, location)
            .await
            .map(|_| ())
    }

    /// Persist a flag and mirror it into the audit trail. Both writes are
    /// best effort.
    async fn flag(&self, flag: NewFraudFlag) {
        let audit_entry = NewAuditLogEntry::new(
            Some(flag.user_id.clone()),
            "FRAUD_FLAGGED",
            "fraud_flag",
            Some(flag.id.clone()),
            flag.ip.clone(),
            None,
            json!({ "reason": flag.reason, "severity": flag.severity }),
            200,
        );

        if let Err(e) = self.provider.fraud_flag().insert(flag).await {
            tracing::error!(error = %e, "Failed to persist fraud flag");
            return;
        }

        self.audit(audit_entry).await;
    }

    async fn audit(&self, entry: NewAuditLogEntry) {
        if let Err(e) = self.provider.audit_log().insert(entry).await {
            tracing::warn!(error = %e, "Failed to write audit log entry");
        }
    }

    /// Most recent flags for a user, newest first.
    pub async fn alerts(&self, user_id: &UserId, limit: u32) -> Result<Vec<FraudFlag>, Error> {
        self.provider.fraud_flag().recent(user_id, limit).await
    }

    /// Most recent login attempts for a user, newest first.
    pub async fn login_history(
        &self,
        user_id: &UserId,
        limit: u32,
    ) -> Result<Vec<LoginAttempt>, Error> {
        self.provider.login_attempt().recent(user_id, limit).await
    }
}
