use async_trait::async_trait;
use chrono::Utc;
use sqlx::SqlitePool;
use vigil_core::{
    Error, GeoLocation, UserId,
    error::StorageError,
    repositories::GeoProfileRepository,
    storage::GeoProfile,
};

use crate::SqliteGeoProfile;

/// Visits to an untrusted location before it is promoted to trusted.
const TRUST_PROMOTION_THRESHOLD: i64 = 3;

pub struct SqliteGeoProfileRepository {
    pool: SqlitePool,
}

impl SqliteGeoProfileRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl GeoProfileRepository for SqliteGeoProfileRepository {
    async fn trusted_profiles(&self, user_id: &UserId) -> Result<Vec<GeoProfile>, Error> {
        let rows = sqlx::query_as::<_, SqliteGeoProfile>(
            "SELECT * FROM geo_profiles WHERE user_id = ?1 AND trusted = 1",
        )
        .bind(user_id.as_str())
        .fetch_all(&self.pool)
        .await
        .map_err(|e| Error::Storage(StorageError::Database(e.to_string())))?;

        Ok(rows.into_iter().map(Into::into).collect())
    }

    async fn record_visit(
        &self,
        user_id: &UserId,
        location: &GeoLocation,
    ) -> Result<GeoProfile, Error> {
        let country = location
            .country_code
            .as_deref()
            .ok_or_else(|| {
                Error::Storage(StorageError::Constraint(
                    "Cannot profile a location without a country code".to_string(),
                ))
            })?;
        let now = Utc::now().timestamp();

        // known location: bump the counter, promoting at the threshold.
        // `city IS ?` is the null-safe comparison.
        let updated = sqlx::query_as::<_, SqliteGeoProfile>(
            r#"
            UPDATE geo_profiles
            SET login_count = login_count + 1,
                trusted = CASE
                    WHEN login_count + 1 >= ?1 THEN 1
                    ELSE trusted
                END,
                latitude = COALESCE(latitude, ?2),
                longitude = COALESCE(longitude, ?3),
                last_seen = ?4
            WHERE user_id = ?5 AND country_code = ?6 AND city IS ?7
            RETURNING *
            "#,
        )
        .bind(TRUST_PROMOTION_THRESHOLD)
        .bind(location.latitude)
        .bind(location.longitude)
        .bind(now)
        .bind(user_id.as_str())
        .bind(country)
        .bind(&location.city)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| Error::Storage(StorageError::Database(e.to_string())))?;

        if let Some(profile) = updated {
            return Ok(profile.into());
        }

        // new location: a user's first profile is trusted immediately,
        // anything after that starts untrusted
        let has_trusted: bool = sqlx::query_scalar(
            "SELECT EXISTS(SELECT 1 FROM geo_profiles WHERE user_id = ?1 AND trusted = 1)",
        )
        .bind(user_id.as_str())
        .fetch_one(&self.pool)
        .await
        .map_err(|e| Error::Storage(StorageError::Database(e.to_string())))?;

        let inserted = sqlx::query_as::<_, SqliteGeoProfile>(
            r#"
            INSERT INTO geo_profiles
                (user_id, country_code, city, latitude, longitude, trusted, login_count, first_seen, last_seen)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, 1, ?7, ?7)
            RETURNING *
            "#,
        )
        .bind(user_id.as_str())
        .bind(country)
        .bind(&location.city)
        .bind(location.latitude)
        .bind(location.longitude)
        .bind(!has_trusted)
        .bind(now)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| Error::Storage(StorageError::Database(e.to_string())))?;

        Ok(inserted.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing;
    use vigil_core::repositories::GeoProfileRepositoryProvider;

    fn location(country: &str, city: Option<&str>) -> GeoLocation {
        GeoLocation {
            ip: "203.0.113.1".to_string(),
            country_code: Some(country.to_string()),
            city: city.map(str::to_string),
            latitude: Some(40.7128),
            longitude: Some(-74.0060),
            is_local: false,
        }
    }

    #[tokio::test]
    async fn test_first_location_trusted_immediately() {
        let provider = testing::provider().await;
        let repo = provider.geo_profile();
        let user_id = UserId::new_random();

        let profile = repo
            .record_visit(&user_id, &location("US", Some("New York")))
            .await
            .unwrap();

        assert!(profile.trusted);
        assert_eq!(profile.login_count, 1);
        assert_eq!(repo.trusted_profiles(&user_id).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_second_location_promoted_at_third_visit() {
        let provider = testing::provider().await;
        let repo = provider.geo_profile();
        let user_id = UserId::new_random();

        repo.record_visit(&user_id, &location("US", Some("New York")))
            .await
            .unwrap();

        let paris = GeoLocation {
            ip: "203.0.113.2".to_string(),
            country_code: Some("FR".to_string()),
            city: Some("Paris".to_string()),
            latitude: Some(48.8566),
            longitude: Some(2.3522),
            is_local: false,
        };

        let first = repo.record_visit(&user_id, &paris).await.unwrap();
        assert!(!first.trusted);

        let second = repo.record_visit(&user_id, &paris).await.unwrap();
        assert!(!second.trusted);
        assert_eq!(second.login_count, 2);

        let third = repo.record_visit(&user_id, &paris).await.unwrap();
        assert!(third.trusted);
        assert_eq!(third.login_count, 3);

        assert_eq!(repo.trusted_profiles(&user_id).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_null_city_matches_itself() {
        let provider = testing::provider().await;
        let repo = provider.geo_profile();
        let user_id = UserId::new_random();

        repo.record_visit(&user_id, &location("US", None))
            .await
            .unwrap();
        let profile = repo
            .record_visit(&user_id, &location("US", None))
            .await
            .unwrap();

        // same profile row, not a duplicate
        assert_eq!(profile.login_count, 2);
    }

    #[tokio::test]
    async fn test_coordinates_backfilled_once() {
        let provider = testing::provider().await;
        let repo = provider.geo_profile();
        let user_id = UserId::new_random();

        let mut no_coords = location("US", Some("New York"));
        no_coords.latitude = None;
        no_coords.longitude = None;
        repo.record_visit(&user_id, &no_coords).await.unwrap();

        let profile = repo
            .record_visit(&user_id, &location("US", Some("New York")))
            .await
            .unwrap();
        assert_eq!(profile.latitude, Some(40.7128));

        // an update never overwrites existing coordinates
        let mut other_coords = location("US", Some("New York"));
        other_coords.latitude = Some(0.0);
        other_coords.longitude = Some(0.0);
        let profile = repo.record_visit(&user_id, &other_coords).await.unwrap();
        assert_eq!(profile.latitude, Some(40.7128));
    }

    #[tokio::test]
    async fn test_location_without_country_rejected() {
        let provider = testing::provider().await;
        let repo = provider.geo_profile();
        let user_id = UserId::new_random();

        let result = repo
            .record_visit(&user_id, &GeoLocation::local("192.168.1.1"))
            .await;

        assert!(matches!(
            result,
            Err(Error::Storage(StorageError::Constraint(_)))
        ));
    }
}
