use std::path::{Path, PathBuf};

use trip_tracker_lib::config::TrackerConfig;

use crate::{StorageError, CONFIG_PATH};

/// Reads the tracker config from `path`, or `data/tracker.conf` under the project root.
/// A missing file yields the defaults.
pub fn load_config(path: Option<&Path>) -> Result<TrackerConfig, StorageError> {
    let path: PathBuf = match path {
        Some(path) => path.to_path_buf(),
        None => project_root::get_project_root()
            .map_err(StorageError::ProjectRoot)?
            .join(CONFIG_PATH),
    };

    match std::fs::read_to_string(&path) {
        Ok(text) => {
            tracing::debug!("Loading config from {:?}", path);
            Ok(TrackerConfig::parse(&text)?)
        }
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            tracing::debug!("No config at {:?}, using defaults", path);
            Ok(TrackerConfig::default())
        }
        Err(err) => Err(StorageError::io(&path, err)),
    }
}
