//! Position fixes and geographic coordinates
//!
//! This module handles:
//! - The immutable `PositionFix` value delivered by position sources
//! - Coordinate validation and great-circle distance
//! - Fix arbitration (see [`arbiter`])

pub mod arbiter;

use crate::constants::geo::EARTH_RADIUS_METERS;
use serde::{Deserialize, Serialize};

pub use arbiter::is_better_fix;

/// A geographic coordinate (latitude, longitude)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    pub lat: f64,
    pub lng: f64,
}

impl Coordinates {
    /// Create new coordinates
    pub fn new(lat: f64, lng: f64) -> Self {
        Self { lat, lng }
    }

    /// Validate that coordinates are within valid ranges
    ///
    /// Latitude: -90 to 90
    /// Longitude: -180 to 180
    pub fn validate(&self) -> crate::error::Result<()> {
        if !(-90.0..=90.0).contains(&self.lat) {
            return Err(crate::error::Error::InvalidCoordinates(format!(
                "Latitude {} is out of range [-90, 90]",
                self.lat
            )));
        }
        if !(-180.0..=180.0).contains(&self.lng) {
            return Err(crate::error::Error::InvalidCoordinates(format!(
                "Longitude {} is out of range [-180, 180]",
                self.lng
            )));
        }
        Ok(())
    }

    /// Great-circle distance to another coordinate in meters (haversine)
    pub fn distance_to(&self, other: &Coordinates) -> f64 {
        let lat1 = self.lat.to_radians();
        let lat2 = other.lat.to_radians();
        let d_lat = (other.lat - self.lat).to_radians();
        let d_lng = (other.lng - self.lng).to_radians();

        let a = (d_lat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (d_lng / 2.0).sin().powi(2);
        let c = 2.0 * a.sqrt().atan2((1.0 - a).sqrt());

        EARTH_RADIUS_METERS * c
    }
}

/// A single instantaneous position reading
///
/// Fixes are plain values: they are never mutated after creation and carry
/// no identity beyond their fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PositionFix {
    /// Wall-clock capture time in milliseconds since the Unix epoch
    pub timestamp_millis: i64,

    /// Horizontal accuracy radius in meters (lower is better)
    pub accuracy_meters: f32,

    /// Latitude in degrees
    pub latitude: f64,

    /// Longitude in degrees
    pub longitude: f64,

    /// Name of the source that produced this fix, if known
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_id: Option<String>,
}

impl PositionFix {
    /// Create a fix without a source id
    pub fn new(latitude: f64, longitude: f64, accuracy_meters: f32, timestamp_millis: i64) -> Self {
        Self {
            timestamp_millis,
            accuracy_meters,
            latitude,
            longitude,
            source_id: None,
        }
    }

    /// The fix position as coordinates
    pub fn coordinates(&self) -> Coordinates {
        Coordinates::new(self.latitude, self.longitude)
    }

    /// Capture time as a UTC datetime, if representable
    pub fn captured_at(&self) -> Option<chrono::DateTime<chrono::Utc>> {
        chrono::DateTime::from_timestamp_millis(self.timestamp_millis)
    }
}
