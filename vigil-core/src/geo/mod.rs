//! IP geolocation
//!
//! Resolution is best effort: requests from private or local addresses are
//! answered without a network call, and lookup failures degrade to an
//! unknown location rather than failing the caller.

use std::net::IpAddr;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::Error;

mod http;

pub use http::IpApiResolver;

const EARTH_RADIUS_KM: f64 = 6371.0;

/// Resolved location for a source IP.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeoLocation {
    pub ip: String,
    pub country_code: Option<String>,
    pub city: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    /// True when the IP is private or loopback and was never looked up.
    pub is_local: bool,
}

impl GeoLocation {
    /// Location for a private or loopback address.
    pub fn local(ip: &str) -> Self {
        Self {
            ip: ip.to_string(),
            country_code: None,
            city: Some("Local".to_string()),
            latitude: None,
            longitude: None,
            is_local: true,
        }
    }

    /// Location for an IP the resolver could not place.
    pub fn unknown(ip: &str) -> Self {
        Self {
            ip: ip.to_string(),
            country_code: None,
            city: None,
            latitude: None,
            longitude: None,
            is_local: false,
        }
    }

    pub fn has_coordinates(&self) -> bool {
        self.latitude.is_some() && self.longitude.is_some()
    }
}

/// Resolves an IP address to a [`GeoLocation`].
#[async_trait]
pub trait GeolocationResolver: Send + Sync + 'static {
    async fn resolve(&self, ip: &str) -> Result<GeoLocation, Error>;
}

/// Whether `ip` parses as a private, link-local, loopback or unspecified
/// address. Unparseable strings are treated as public so they still go
/// through the resolver.
pub fn is_private_ip(ip: &str) -> bool {
    match ip.parse::<IpAddr>() {
        Ok(IpAddr::V4(v4)) => {
            v4.is_loopback() || v4.is_private() || v4.is_link_local() || v4.is_unspecified()
        }
        Ok(IpAddr::V6(v6)) => {
            v6.is_loopback()
                || v6.is_unspecified()
                // fc00::/7 unique local
                || (v6.segments()[0] & 0xfe00) == 0xfc00
                // fe80::/10 link local
                || (v6.segments()[0] & 0xffc0) == 0xfe80
        }
        Err(_) => false,
    }
}

/// Great-circle distance between two coordinates in kilometers.
pub fn haversine_km(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    let d_lat = (lat2 - lat1).to_radians();
    let d_lon = (lon2 - lon1).to_radians();

    let a = (d_lat / 2.0).sin().powi(2)
        + lat1.to_radians().cos() * lat2.to_radians().cos() * (d_lon / 2.0).sin().powi(2);
    let c = 2.0 * a.sqrt().atan2((1.0 - a).sqrt());

    EARTH_RADIUS_KM * c
}
