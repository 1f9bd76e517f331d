use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{
    coordinate::Coordinate,
    geo_distance::haversine_distance,
    position_fix::PositionFix,
    trip::{round_decimals, Trip},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SessionState {
    Idle,
    Tracking,
    Stopped,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SessionError {
    #[error("session is not tracking (state: {0:?})")]
    NotTracking(SessionState),
    #[error("session has already been stopped")]
    AlreadyStopped,
}

/// What happened to a fix handed to [`TrackingSession::ingest`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum IngestOutcome {
    /// First point of the path, nothing to measure against.
    First,
    Accepted { distance_m: f64 },
    /// Within the noise threshold of the last point.
    Discarded { distance_m: f64 },
    /// Latitude or longitude is not a finite number.
    Rejected,
}

/// Live statistics, rounded the way they are displayed.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct SessionStats {
    pub distance_km: f64,
    pub speed_kmh: f64,
    pub top_speed_kmh: f64,
    pub altitude_m: Option<f64>,
}

/// One recording, from `start` to `stop`. A new session is made for every recording.
#[derive(Debug, Clone)]
pub struct TrackingSession {
    state: SessionState,
    noise_threshold_m: f64,
    path: Vec<Coordinate>,
    distance_km: f64,
    current_speed_kmh: f64,
    top_speed_kmh: f64,
    last_altitude_m: Option<f64>,
}

impl TrackingSession {
    pub fn new(noise_threshold_m: f64) -> Self {
        Self {
            state: SessionState::Idle,
            noise_threshold_m,
            path: Vec::new(),
            distance_km: 0.,
            current_speed_kmh: 0.,
            top_speed_kmh: 0.,
            last_altitude_m: None,
        }
    }

    pub fn start(&mut self) -> Result<(), SessionError> {
        match self.state {
            // Re-entry must not wipe a recording in progress
            SessionState::Tracking => Ok(()),
            SessionState::Stopped => Err(SessionError::AlreadyStopped),
            SessionState::Idle => {
                self.path.clear();
                self.distance_km = 0.;
                self.current_speed_kmh = 0.;
                self.top_speed_kmh = 0.;
                self.last_altitude_m = None;
                self.state = SessionState::Tracking;
                tracing::info!("Tracking started");
                Ok(())
            }
        }
    }

    pub fn ingest(&mut self, fix: &PositionFix) -> Result<IngestOutcome, SessionError> {
        if self.state != SessionState::Tracking {
            return Err(SessionError::NotTracking(self.state));
        }

        if !fix.coordinate.is_finite() {
            tracing::warn!("Rejected fix with non-finite coordinate {:?}", fix.coordinate);
            return Ok(IngestOutcome::Rejected);
        }

        let Some(&last_point) = self.path.last() else {
            self.path.push(fix.coordinate);
            self.update_readings(fix);
            return Ok(IngestOutcome::First);
        };

        let distance_m = haversine_distance(last_point, fix.coordinate);
        if !(distance_m > self.noise_threshold_m) {
            tracing::debug!("Discarded fix {:.1} m from last point", distance_m);
            return Ok(IngestOutcome::Discarded { distance_m });
        }

        self.path.push(fix.coordinate);
        self.distance_km += distance_m / 1000.;
        self.update_readings(fix);

        Ok(IngestOutcome::Accepted { distance_m })
    }

    fn update_readings(&mut self, fix: &PositionFix) {
        self.current_speed_kmh = fix.speed_kmh();
        self.top_speed_kmh = self.top_speed_kmh.max(self.current_speed_kmh);
        if let Some(altitude) = fix.altitude_m {
            self.last_altitude_m = Some(altitude);
        }
    }

    /// Ends the recording. Yields a trip unless no point was ever accepted.
    pub fn stop(&mut self, id: i64, name: String) -> Result<Option<Trip>, SessionError> {
        if self.state != SessionState::Tracking {
            return Err(SessionError::NotTracking(self.state));
        }
        self.state = SessionState::Stopped;

        if self.path.is_empty() {
            tracing::info!("Tracking stopped without any points");
            return Ok(None);
        }

        tracing::info!("Tracking stopped: {} points, {:.2} km", self.path.len(), self.distance_km);
        Ok(Some(Trip::new(id, name, self.distance_km, self.top_speed_kmh, self.path.clone())))
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn is_tracking(&self) -> bool {
        self.state == SessionState::Tracking
    }

    pub fn path(&self) -> &[Coordinate] {
        &self.path
    }

    pub fn last_point(&self) -> Option<Coordinate> {
        self.path.last().copied()
    }

    /// Accumulated distance at full precision.
    pub fn distance_km(&self) -> f64 {
        self.distance_km
    }

    pub fn current_speed_kmh(&self) -> f64 {
        self.current_speed_kmh
    }

    pub fn top_speed_kmh(&self) -> f64 {
        self.top_speed_kmh
    }

    pub fn last_altitude_m(&self) -> Option<f64> {
        self.last_altitude_m
    }

    pub fn stats(&self) -> SessionStats {
        SessionStats {
            distance_km: self.distance_km,
            speed_kmh: round_decimals(self.current_speed_kmh, 1),
            top_speed_kmh: round_decimals(self.top_speed_kmh, 1),
            altitude_m: self.last_altitude_m.map(f64::round),
        }
    }
}
