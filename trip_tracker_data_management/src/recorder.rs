use std::fmt;

use chrono::{Local, Utc};
use trip_tracker_lib::{
    config::TrackerConfig,
    coordinate::Coordinate,
    position_fix::{FixError, PositionFix},
    track_session::{IngestOutcome, SessionStats, TrackingSession},
    trip::{Trip, TripArchive},
};

use crate::{storage::KeyValueStorage, trip_store::TripStore};

/// The status line shown to the user.
#[derive(Debug, Clone, PartialEq)]
pub enum RecorderStatus {
    Online,
    Streaming,
    SensorError(FixError),
    Saved(String),
    InsufficientData,
}

impl fmt::Display for RecorderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RecorderStatus::Online => write!(f, "SYSTEM_ONLINE"),
            RecorderStatus::Streaming => write!(f, "STREAM_ACTIVE"),
            RecorderStatus::SensorError(err) => write!(f, "ERR: {err}"),
            RecorderStatus::Saved(name) => write!(f, "SAVED: {name}"),
            RecorderStatus::InsufficientData => write!(f, "INSUFFICIENT_DATA"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TripSummary {
    pub id: i64,
    pub name: String,
    pub distance_km: f64,
    pub top_speed_kmh: f64,
    pub points: usize,
}

impl From<&Trip> for TripSummary {
    fn from(trip: &Trip) -> Self {
        Self {
            id: trip.id,
            name: trip.name.clone(),
            distance_km: trip.distance_km,
            top_speed_kmh: trip.top_speed_kmh,
            points: trip.path.len(),
        }
    }
}

/// Everything the map and panel need to draw one frame.
#[derive(Debug, Clone, PartialEq)]
pub struct RecorderView {
    pub tracking: bool,
    pub path: Vec<Coordinate>,
    pub stats: SessionStats,
    pub replay_position: Option<Coordinate>,
    pub display_position: Coordinate,
    pub camera_locked: bool,
    pub selected_trip: Option<i64>,
    pub status: String,
    pub trips: Vec<TripSummary>,
}

/// Owns the archive and the live recording. All mutation goes through here.
pub struct Recorder<S: KeyValueStorage> {
    config: TrackerConfig,
    store: TripStore<S>,
    archive: TripArchive,
    session: Option<TrackingSession>,
    selected_trip: Option<i64>,
    replay_position: Option<Coordinate>,
    camera_locked: bool,
    status: RecorderStatus,
}

impl<S: KeyValueStorage> Recorder<S> {
    pub fn new(config: TrackerConfig, storage: S) -> Self {
        let store = TripStore::new(storage, config.storage_key.clone());
        let archive = store.load();

        Self {
            config,
            store,
            archive,
            session: None,
            selected_trip: None,
            replay_position: None,
            camera_locked: true,
            status: RecorderStatus::Online,
        }
    }

    pub fn is_tracking(&self) -> bool {
        self.session.as_ref().is_some_and(TrackingSession::is_tracking)
    }

    /// Begins a fresh recording. Returns false if one is already running.
    pub fn start_tracking(&mut self) -> bool {
        if self.is_tracking() {
            tracing::debug!("Start ignored, already tracking");
            return false;
        }

        let mut session = TrackingSession::new(self.config.noise_threshold_m);
        if let Err(err) = session.start() {
            tracing::error!("Failed to start session: {err}");
            return false;
        }

        self.session = Some(session);
        self.selected_trip = None;
        self.replay_position = None;
        self.status = RecorderStatus::Online;
        true
    }

    pub fn ingest(&mut self, fix: &PositionFix) -> Option<IngestOutcome> {
        let session = self.session.as_mut()?;
        match session.ingest(fix) {
            Ok(outcome) => {
                if matches!(outcome, IngestOutcome::Accepted { .. }) {
                    self.status = RecorderStatus::Streaming;
                }
                Some(outcome)
            }
            Err(err) => {
                tracing::warn!("Fix ignored: {err}");
                None
            }
        }
    }

    /// Sensor failures only change the status line; tracking carries on.
    pub fn report_fix_error(&mut self, err: FixError) {
        tracing::warn!("Location sensor error: {err}");
        self.status = RecorderStatus::SensorError(err);
    }

    /// Ends the recording and archives it. Blank or missing names get a `LOG_<time>` label.
    pub fn stop_tracking(&mut self, name: Option<String>) -> Option<Trip> {
        if !self.is_tracking() {
            tracing::debug!("Stop ignored, not tracking");
            return None;
        }
        let session = self.session.as_mut()?;

        let name = name
            .map(|name| name.trim().to_string())
            .filter(|name| !name.is_empty())
            .unwrap_or_else(|| Trip::default_name(Local::now()));
        let id = self.archive.next_trip_id(Utc::now());

        match session.stop(id, name) {
            Ok(Some(trip)) => {
                tracing::info!("Saving trip {} \"{}\"", trip.id, trip.name);
                self.archive.add(trip.clone());
                self.persist();
                self.status = RecorderStatus::Saved(trip.name.clone());
                Some(trip)
            }
            Ok(None) => {
                self.status = RecorderStatus::InsufficientData;
                None
            }
            Err(err) => {
                tracing::error!("Failed to stop session: {err}");
                None
            }
        }
    }

    /// Returns whether a trip was removed.
    pub fn delete_trip(&mut self, id: i64) -> bool {
        let before = self.archive.len();
        self.archive = self.store.delete(&self.archive, id);

        if self.selected_trip == Some(id) {
            self.selected_trip = None;
        }
        self.archive.len() < before
    }

    /// Shows an archived trip on the map. Returns false for unknown ids.
    pub fn select_trip(&mut self, id: i64) -> bool {
        if self.archive.get(id).is_none() {
            return false;
        }
        self.selected_trip = Some(id);
        true
    }

    pub fn trip_path(&self, id: i64) -> Option<Vec<Coordinate>> {
        self.archive.get(id).map(|trip| trip.path.clone())
    }

    pub fn set_replay_position(&mut self, position: Option<Coordinate>) {
        self.replay_position = position;
    }

    pub fn toggle_camera_lock(&mut self) -> bool {
        self.camera_locked = !self.camera_locked;
        self.camera_locked
    }

    fn persist(&mut self) {
        if let Err(err) = self.store.save(&self.archive) {
            tracing::error!("Failed to save trips: {err}");
        }
    }

    fn selected(&self) -> Option<&Trip> {
        if self.is_tracking() {
            return None;
        }
        self.selected_trip.and_then(|id| self.archive.get(id))
    }

    /// The live path while tracking, otherwise the selected trip or the last recording.
    pub fn displayed_path(&self) -> &[Coordinate] {
        if let Some(trip) = self.selected() {
            return &trip.path;
        }
        self.session.as_ref().map(TrackingSession::path).unwrap_or(&[])
    }

    /// Replay cursor, else the end of the displayed path, else the configured fallback.
    pub fn display_position(&self) -> Coordinate {
        self.replay_position
            .or_else(|| self.displayed_path().last().copied())
            .unwrap_or(self.config.fallback_position)
    }

    pub fn stats(&self) -> SessionStats {
        if let Some(trip) = self.selected() {
            return SessionStats {
                distance_km: trip.distance_km,
                top_speed_kmh: trip.top_speed_kmh,
                ..SessionStats::default()
            };
        }
        self.session.as_ref().map(TrackingSession::stats).unwrap_or_default()
    }

    pub fn view(&self) -> RecorderView {
        RecorderView {
            tracking: self.is_tracking(),
            path: self.displayed_path().to_vec(),
            stats: self.stats(),
            replay_position: self.replay_position,
            display_position: self.display_position(),
            camera_locked: self.camera_locked,
            selected_trip: self.selected_trip,
            status: self.status.to_string(),
            trips: self.archive.trips().iter().map(TripSummary::from).collect(),
        }
    }

    pub fn archive(&self) -> &TripArchive {
        &self.archive
    }

    pub fn session(&self) -> Option<&TrackingSession> {
        self.session.as_ref()
    }

    pub fn status(&self) -> &RecorderStatus {
        &self.status
    }

    pub fn config(&self) -> &TrackerConfig {
        &self.config
    }

    pub fn store(&self) -> &TripStore<S> {
        &self.store
    }
}
