use const_format::concatcp;
use thiserror::Error;

pub mod config_file;
pub mod fix_source;
pub mod gpx_util;
pub mod recorder;
pub mod replay_player;
pub mod service;
pub mod storage;
pub mod trip_store;

pub const DATA_DIR: &str = "data/";
pub const CONFIG_PATH: &str = concatcp!(DATA_DIR, "tracker.conf");

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("io error on {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to serialize trip archive: {0}")]
    Serialize(#[from] serde_json::Error),
    #[error("project root not found: {0}")]
    ProjectRoot(std::io::Error),
    #[error("invalid config: {0}")]
    Config(#[from] trip_tracker_lib::config::ConfigError),
    #[error("gpx error: {0}")]
    Gpx(String),
}

impl StorageError {
    pub(crate) fn io(path: impl AsRef<std::path::Path>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.as_ref().display().to_string(),
            source,
        }
    }
}
