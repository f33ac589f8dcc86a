use async_trait::async_trait;

use crate::{Error, account::UserId, geo::GeoLocation, storage::GeoProfile};

/// Repository for per-user location history.
#[async_trait]
pub trait GeoProfileRepository: Send + Sync + 'static {
    /// Trusted location profiles for a user
    async fn trusted_profiles(&self, user_id: &UserId) -> Result<Vec<GeoProfile>, Error>;

    /// Record a successful login from `location`, creating or updating the
    /// matching profile.
    ///
    /// A user's first profile is trusted immediately; later locations start
    /// untrusted and are promoted once their login count reaches the
    /// trust threshold. Matching is by country code plus city.
    async fn record_visit(
        &self,
        user_id: &UserId,
        location: &GeoLocation,
    ) -> Result<GeoProfile, Error>;
}
