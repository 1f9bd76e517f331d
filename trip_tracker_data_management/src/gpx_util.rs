use std::{fs::File, io::{BufReader, BufWriter}, path::Path};

use gpx::{Gpx, GpxVersion, Track, TrackSegment, Waypoint};
use trip_tracker_lib::{position_fix::PositionFix, trip::Trip};

use crate::StorageError;

/// Every track point in the file, in order, as fixes.
pub fn read_gpx_fixes(path: &Path) -> Result<Vec<PositionFix>, StorageError> {
    let file = File::open(path).map_err(|err| StorageError::io(path, err))?;
    let reader = BufReader::new(file);
    let gpx = gpx::read(reader).map_err(|err| StorageError::Gpx(err.to_string()))?;

    let mut fixes = Vec::new();
    for track in gpx.tracks {
        for segment in track.segments {
            for point in segment.points {
                let mut fix = PositionFix::from(point.point());
                fix.speed_mps = point.speed;
                fix.altitude_m = point.elevation;
                fixes.push(fix);
            }
        }
    }

    tracing::debug!("Read {} fixes from {:?}", fixes.len(), path);
    Ok(fixes)
}

pub fn export_trip_gpx(trip: &Trip, path: &Path) -> Result<(), StorageError> {
    let mut gpx = Gpx::default();
    gpx.version = GpxVersion::Gpx11;
    gpx.creator = Some("trip_tracker".into());
    gpx.metadata = Some(gpx::Metadata {
        name: Some(trip.name.clone()),
        ..Default::default()
    });

    let mut track = Track::new();
    track.name = Some(trip.name.clone());

    let mut segment = TrackSegment::new();
    segment.points.extend(trip.path.iter().map(|coordinate| Waypoint::new((*coordinate).into())));

    track.segments.push(segment);
    gpx.tracks.push(track);

    let file = File::create(path).map_err(|err| StorageError::io(path, err))?;
    gpx::write(&gpx, BufWriter::new(file)).map_err(|err| StorageError::Gpx(err.to_string()))?;

    tracing::info!("Exported trip {} to {:?}", trip.id, path);
    Ok(())
}
