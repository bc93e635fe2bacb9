//! Client-to-region latency estimation.
//!
//! The estimate is an approximation: great-circle distance times a linear
//! cost factor plus a fixed base latency. It ignores routing topology,
//! peering and congestion, and stands in for a measured round-trip time when
//! only the client's coordinates are known.

use serde::{Deserialize, Serialize};

/// Mean Earth radius in kilometres.
const EARTH_RADIUS_KM: f64 = 6371.0;

/// A point on the globe in decimal degrees.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub latitude: f64,
    pub longitude: f64,
}

impl GeoPoint {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self { latitude, longitude }
    }

    /// Returns true if both coordinates are finite and within range.
    pub fn is_valid(&self) -> bool {
        self.latitude.is_finite()
            && self.longitude.is_finite()
            && (-90.0..=90.0).contains(&self.latitude)
            && (-180.0..=180.0).contains(&self.longitude)
    }

    /// Great-circle distance to `other` in kilometres (haversine).
    pub fn distance_km(&self, other: &GeoPoint) -> f64 {
        let lat1 = self.latitude.to_radians();
        let lat2 = other.latitude.to_radians();
        let d_lat = (other.latitude - self.latitude).to_radians();
        let d_lon = (other.longitude - self.longitude).to_radians();

        let a = (d_lat / 2.0).sin().powi(2)
            + lat1.cos() * lat2.cos() * (d_lon / 2.0).sin().powi(2);
        let c = 2.0 * a.sqrt().atan2((1.0 - a).sqrt());
        EARTH_RADIUS_KM * c
    }
}

/// Linear distance-to-latency model.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LatencyModel {
    /// Fixed latency added to every estimate.
    pub base_latency_ms: f64,
    /// Cost per kilometre of great-circle distance.
    pub ms_per_km: f64,
}

impl Default for LatencyModel {
    fn default() -> Self {
        Self {
            base_latency_ms: 20.0,
            ms_per_km: 0.1,
        }
    }
}

impl LatencyModel {
    /// Estimated latency in milliseconds between a client and a region.
    pub fn estimate_ms(&self, client: &GeoPoint, region: &GeoPoint) -> f64 {
        self.base_latency_ms + client.distance_km(region) * self.ms_per_km
    }
}
