use geo_types::Point;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::coordinate::Coordinate;

/// One location sample as reported by the device.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PositionFix {
    pub coordinate: Coordinate,
    /// Instantaneous ground speed in m/s, if the sensor reports one.
    pub speed_mps: Option<f64>,
    pub altitude_m: Option<f64>,
}

impl PositionFix {
    pub fn new(coordinate: Coordinate) -> Self {
        Self {
            coordinate,
            speed_mps: None,
            altitude_m: None,
        }
    }

    pub fn with_speed(mut self, speed_mps: f64) -> Self {
        self.speed_mps = Some(speed_mps);
        self
    }

    pub fn with_altitude(mut self, altitude_m: f64) -> Self {
        self.altitude_m = Some(altitude_m);
        self
    }

    /// Reported speed in km/h. Missing, zero, negative or non-finite speeds count as standing still.
    pub fn speed_kmh(&self) -> f64 {
        match self.speed_mps {
            Some(speed) if speed.is_finite() && speed > 0. => speed * 3.6,
            _ => 0.,
        }
    }
}

impl From<Point> for PositionFix {
    fn from(point: Point) -> Self {
        Self::new(point.into())
    }
}

/// Failures reported by the location sensor instead of a fix.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum FixError {
    #[error("User denied Geolocation")]
    PermissionDenied,
    #[error("Position unavailable")]
    PositionUnavailable,
    #[error("Timeout expired")]
    Timeout,
    #[error("{0}")]
    Other(String),
}
