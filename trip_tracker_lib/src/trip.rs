use chrono::{DateTime, Local, Utc};
use serde::{Deserialize, Deserializer, Serialize};

use crate::coordinate::Coordinate;

/// A finished recording. Never modified after it has been archived.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Trip {
    pub id: i64,
    pub name: String,
    #[serde(rename = "distance", deserialize_with = "number_or_string")]
    pub distance_km: f64,
    #[serde(rename = "topSpeed", default)]
    pub top_speed_kmh: f64,
    pub path: Vec<Coordinate>,
}

impl Trip {
    /// Distance is kept to 2 decimals and top speed to 1, as they are shown in the archive.
    pub fn new(id: i64, name: String, distance_km: f64, top_speed_kmh: f64, path: Vec<Coordinate>) -> Self {
        Self {
            id,
            name,
            distance_km: round_decimals(distance_km, 2),
            top_speed_kmh: round_decimals(top_speed_kmh, 1),
            path,
        }
    }

    pub fn default_name(now: DateTime<Local>) -> String {
        format!("LOG_{}", now.format("%H:%M:%S"))
    }
}

pub fn round_decimals(value: f64, decimals: i32) -> f64 {
    let factor = 10f64.powi(decimals);
    (value * factor).round() / factor
}

// Older archives stored the distance as a preformatted string
fn number_or_string<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum NumberOrString {
        Number(f64),
        Text(String),
    }

    match NumberOrString::deserialize(deserializer)? {
        NumberOrString::Number(value) => Ok(value),
        NumberOrString::Text(text) => text.trim().parse().map_err(serde::de::Error::custom),
    }
}

/// All saved trips, newest first.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TripArchive {
    trips: Vec<Trip>,
}

impl TripArchive {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_trips(trips: Vec<Trip>) -> Self {
        Self { trips }
    }

    pub fn trips(&self) -> &[Trip] {
        &self.trips
    }

    pub fn len(&self) -> usize {
        self.trips.len()
    }

    pub fn is_empty(&self) -> bool {
        self.trips.is_empty()
    }

    pub fn get(&self, id: i64) -> Option<&Trip> {
        self.trips.iter().find(|trip| trip.id == id)
    }

    pub fn add(&mut self, trip: Trip) {
        self.trips.insert(0, trip);
    }

    /// A copy of the archive without the trip `id`. Unknown ids leave the archive as is.
    pub fn without(&self, id: i64) -> TripArchive {
        Self {
            trips: self.trips.iter().filter(|trip| trip.id != id).cloned().collect(),
        }
    }

    /// Millisecond timestamp of `now`, bumped past every existing id if the clock did not advance.
    pub fn next_trip_id(&self, now: DateTime<Utc>) -> i64 {
        let candidate = now.timestamp_millis();
        match self.trips.iter().map(|trip| trip.id).max() {
            Some(max) if max >= candidate => max.saturating_add(1),
            _ => candidate,
        }
    }
}
