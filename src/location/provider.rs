use async_trait::async_trait;
use jiff::Timestamp;
use serde::{Deserialize, Serialize};

use super::LocationError;
use crate::model::Coordinates;

/// Device permission state for location access.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PermissionStatus {
    Granted,
    Denied,
    Undetermined,
}

/// Device location services, implemented by the host platform.
///
/// Timeouts and retries are the implementation's business.
#[async_trait]
pub trait LocationProvider: Send + Sync {
    async fn permission_status(&self) -> Result<PermissionStatus, LocationError>;

    async fn request_permission(&self) -> Result<PermissionStatus, LocationError>;

    async fn current_position(&self) -> Result<Coordinates, LocationError>;

    /// Human-readable address for a point, if the platform knows one.
    async fn reverse_geocode(&self, at: Coordinates) -> Result<Option<String>, LocationError>;

    async fn geocode(&self, address: &str) -> Result<Option<Coordinates>, LocationError>;
}

/// Last position reported by the device.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CurrentLocation {
    pub coordinates: Coordinates,
    pub address: Option<String>,
    pub timestamp: Timestamp,
}

/// Haversine distance between two points, in kilometers.
pub fn calculate_distance(a: Coordinates, b: Coordinates) -> f64 {
    const EARTH_RADIUS_KM: f64 = 6371.0;

    let d_lat = (b.latitude - a.latitude).to_radians();
    let d_lon = (b.longitude - a.longitude).to_radians();

    let h = (d_lat / 2.0).sin().powi(2)
        + a.latitude.to_radians().cos()
            * b.latitude.to_radians().cos()
            * (d_lon / 2.0).sin().powi(2);

    let c = 2.0 * h.sqrt().atan2((1.0 - h).sqrt());
    EARTH_RADIUS_KM * c
}
