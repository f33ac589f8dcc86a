use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;

use crate::{
    Error,
    error::GeoError,
    geo::{GeoLocation, GeolocationResolver, is_private_ip},
};

const IP_API_ENDPOINT: &str = "http://ip-api.com/json";
const LOOKUP_TIMEOUT: Duration = Duration::from_secs(5);

/// Resolver backed by the ip-api.com JSON endpoint.
///
/// Private and loopback addresses are answered locally. Any lookup failure
/// (network error, non-success payload) resolves to an unknown location so
/// callers never fail on geolocation.
pub struct IpApiResolver {
    client: reqwest::Client,
    endpoint: String,
}

#[derive(Debug, Deserialize)]
struct IpApiResponse {
    status: String,
    #[serde(rename = "countryCode")]
    country_code: Option<String>,
    city: Option<String>,
    lat: Option<f64>,
    lon: Option<f64>,
}

impl IpApiResolver {
    pub fn new() -> Result<Self, Error> {
        let client = reqwest::Client::builder()
            .timeout(LOOKUP_TIMEOUT)
            .build()
            .map_err(|e| GeoError::Lookup(format!("Failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            endpoint: IP_API_ENDPOINT.to_string(),
        })
    }

    /// Point the resolver at a different endpoint. Used in tests.
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    async fn lookup(&self, ip: &str) -> Result<GeoLocation, Error> {
        let url = format!(
            "{}/{}?fields=status,countryCode,city,lat,lon",
            self.endpoint, ip
        );

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| GeoError::Lookup(format!("Geolocation request failed: {e}")))?;

        let body: IpApiResponse = response
            .json()
            .await
            .map_err(|e| GeoError::Lookup(format!("Invalid geolocation response: {e}")))?;

        if body.status != "success" {
            return Err(GeoError::Lookup(format!(
                "Geolocation lookup failed for {ip}"
            ))
            .into());
        }

        Ok(GeoLocation {
            ip: ip.to_string(),
            country_code: body.country_code,
            city: body.city,
            latitude: body.lat,
            longitude: body.lon,
            is_local: false,
        })
    }
}

#[async_trait]
impl GeolocationResolver for IpApiResolver {
    async fn resolve(&self, ip: &str) -> Result<GeoLocation, Error> {
        if is_private_ip(ip) {
            return Ok(GeoLocation::local(ip));
        }

        match self.lookup(ip).await {
            Ok(location) => Ok(location),
            Err(e) => {
                tracing::warn!(ip = %ip, error = %e, "Geolocation lookup failed");
                Ok(GeoLocation::unknown(ip))
            }
        }
    }
}
