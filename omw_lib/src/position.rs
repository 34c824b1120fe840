use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LatLng {
    pub lat: f64,
    pub lng: f64,
}

impl LatLng {
    pub fn new(lat: f64, lng: f64) -> Self {
        Self { lat, lng }
    }
}

/// Formats as `lat,lng`, which is what routing APIs expect for an origin.
impl fmt::Display for LatLng {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{},{}", self.lat, self.lng)
    }
}

/// One sample from the geolocation feed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PositionSample {
    pub position: LatLng,
    /// Horizontal accuracy radius in meters, if the device reported one.
    pub accuracy_m: Option<f64>,
    pub timestamp: DateTime<Utc>,
}

impl PositionSample {
    pub fn new(position: LatLng, accuracy_m: Option<f64>, timestamp: DateTime<Utc>) -> Self {
        Self {
            position,
            accuracy_m,
            timestamp,
        }
    }

    pub fn now(position: LatLng) -> Self {
        Self::new(position, None, Utc::now())
    }
}

#[test]
fn latlng_formats_as_origin_param() {
    assert_eq!(LatLng::new(40.7589, -73.9851).to_string(), "40.7589,-73.9851");
}
