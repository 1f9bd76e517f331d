use std::{str::FromStr, time::Duration};

use thiserror::Error;

use crate::coordinate::Coordinate;

pub const DEFAULT_NOISE_THRESHOLD_M: f64 = 10.;
pub const DEFAULT_REPLAY_CADENCE: Duration = Duration::from_millis(150);
pub const DEFAULT_STORAGE_KEY: &str = "saved_trips";
pub const DEFAULT_FALLBACK_POSITION: Coordinate = Coordinate {
    latitude: 20.5937,
    longitude: 78.9629,
};

#[derive(Debug, Clone, PartialEq)]
pub struct TrackerConfig {
    /// Fixes closer than this to the last accepted point are treated as sensor jitter.
    pub noise_threshold_m: f64,
    pub replay_cadence: Duration,
    pub storage_key: String,
    /// Shown when there is neither a replay nor a live path.
    pub fallback_position: Coordinate,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            noise_threshold_m: DEFAULT_NOISE_THRESHOLD_M,
            replay_cadence: DEFAULT_REPLAY_CADENCE,
            storage_key: DEFAULT_STORAGE_KEY.to_string(),
            fallback_position: DEFAULT_FALLBACK_POSITION,
        }
    }
}

#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("line {line}: expected `key = value`")]
    MalformedLine { line: usize },
    #[error("line {line}: invalid value {value:?} for {key}")]
    InvalidValue { line: usize, key: String, value: String },
}

impl TrackerConfig {
    /// Parses `key = value` lines on top of the defaults. Blank lines and `#` comments are skipped.
    pub fn parse(text: &str) -> Result<Self, ConfigError> {
        let mut config = Self::default();

        for (index, line) in text.lines().enumerate() {
            let line_number = index + 1;
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }

            let Some((key, value)) = line.split_once('=') else {
                return Err(ConfigError::MalformedLine { line: line_number });
            };
            let key = key.trim();
            let value = value.trim();

            let invalid = || ConfigError::InvalidValue {
                line: line_number,
                key: key.to_string(),
                value: value.to_string(),
            };

            match key {
                "noise_threshold_m" => {
                    config.noise_threshold_m = parse_value::<f64>(value)
                        .filter(|threshold| threshold.is_finite() && *threshold >= 0.)
                        .ok_or_else(invalid)?
                }
                "replay_cadence_ms" => {
                    config.replay_cadence = parse_value::<u64>(value)
                        .filter(|ms| *ms > 0)
                        .map(Duration::from_millis)
                        .ok_or_else(invalid)?
                }
                "storage_key" => {
                    if value.is_empty() {
                        return Err(invalid());
                    }
                    config.storage_key = value.to_string()
                }
                "fallback_latitude" => {
                    config.fallback_position.latitude = parse_value::<f64>(value)
                        .filter(|lat| (-90. ..=90.).contains(lat))
                        .ok_or_else(invalid)?
                }
                "fallback_longitude" => {
                    config.fallback_position.longitude = parse_value::<f64>(value)
                        .filter(|lon| (-180. ..=180.).contains(lon))
                        .ok_or_else(invalid)?
                }
                _ => {
                    tracing::warn!("Unknown config key: {}", key);
                }
            }
        }

        Ok(config)
    }
}

fn parse_value<T: FromStr>(value: &str) -> Option<T> {
    T::from_str(value).ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_text_gives_defaults() {
        assert_eq!(TrackerConfig::parse("").unwrap(), TrackerConfig::default());
    }

    #[test]
    fn overrides_known_keys() {
        let text = "
            # tuned for walking
            noise_threshold_m = 4.5
            replay_cadence_ms=50

            storage_key = walks
            fallback_latitude = 56.175188
            fallback_longitude = 10.196123
            colour = green
        ";

        let config = TrackerConfig::parse(text).unwrap();
        assert_eq!(config.noise_threshold_m, 4.5);
        assert_eq!(config.replay_cadence, Duration::from_millis(50));
        assert_eq!(config.storage_key, "walks");
        assert_eq!(config.fallback_position, Coordinate::new(56.175188, 10.196123));
    }

    #[test]
    fn rejects_bad_lines() {
        assert_eq!(TrackerConfig::parse("noise_threshold_m"), Err(ConfigError::MalformedLine { line: 1 }));
        assert!(matches!(
            TrackerConfig::parse("\nreplay_cadence_ms = 0"),
            Err(ConfigError::InvalidValue { line: 2, .. })
        ));
        assert!(TrackerConfig::parse("noise_threshold_m = -1").is_err());
        assert!(TrackerConfig::parse("fallback_latitude = 91").is_err());
    }
}
