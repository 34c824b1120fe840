use serde::{Deserialize, Serialize};

use crate::position::LatLng;

const MILES_PER_METER: f64 = 0.000621371;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RouteMetrics {
    pub distance_miles: f64,
    pub eta_minutes: u32,
    pub path: Vec<LatLng>,
}

impl RouteMetrics {
    /// Builds metrics from raw routing service units (meters and seconds).
    pub fn from_service_units(distance_m: f64, duration_s: f64, path: Vec<LatLng>) -> Self {
        Self {
            distance_miles: meters_to_miles(distance_m),
            eta_minutes: seconds_to_minutes(duration_s),
            path,
        }
    }
}

pub fn meters_to_miles(meters: f64) -> f64 {
    meters.max(0.) * MILES_PER_METER
}

/// Rounds to the nearest whole minute.
pub fn seconds_to_minutes(seconds: f64) -> u32 {
    (seconds.max(0.) / 60.).round() as u32
}
