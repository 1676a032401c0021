//! Sentinel configuration: JSON file, then command-line overrides, then validation.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::detector::DetectorConfig;
use crate::sensor::SensorPaths;

pub const DEFAULT_INTERVAL_SECS: f64 = 2.0;
pub const DEFAULT_ANOMALY_THRESHOLD_MA: f64 = 350.0;
pub const DEFAULT_SUSPICION_LIMIT: u32 = 5;
pub const DEFAULT_MODEL_PATH: &str = "watt_model.json";
/// Longest accepted interval between cycles: one day.
pub const MAX_INTERVAL_SECS: f64 = 86_400.0;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("invalid config: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitorConfig {
    /// Seconds slept between cycles.
    pub interval_secs: f64,
    pub anomaly_threshold_ma: f64,
    pub suspicion_limit: u32,
    pub model_path: PathBuf,
    pub sensors: SensorPaths,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            interval_secs: DEFAULT_INTERVAL_SECS,
            anomaly_threshold_ma: DEFAULT_ANOMALY_THRESHOLD_MA,
            suspicion_limit: DEFAULT_SUSPICION_LIMIT,
            model_path: PathBuf::from(DEFAULT_MODEL_PATH),
            sensors: SensorPaths::default(),
        }
    }
}

impl MonitorConfig {
    pub fn from_json(raw: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(raw)?)
    }

    /// Load from `path`; the result is not yet validated.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json(&raw)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.interval_secs > 0.0 && self.interval_secs <= MAX_INTERVAL_SECS) {
            return Err(ConfigError::Invalid(format!(
                "interval_secs must be in (0, {MAX_INTERVAL_SECS}], got {}",
                self.interval_secs
            )));
        }
        if !self.anomaly_threshold_ma.is_finite() || self.anomaly_threshold_ma < 0.0 {
            return Err(ConfigError::Invalid(format!(
                "anomaly_threshold_ma must be a non-negative number, got {}",
                self.anomaly_threshold_ma
            )));
        }
        if self.suspicion_limit < 1 {
            return Err(ConfigError::Invalid(
                "suspicion_limit must be at least 1".to_string(),
            ));
        }
        if self.sensors.wifi_interface.is_empty() || self.sensors.cell_interface.is_empty() {
            return Err(ConfigError::Invalid(
                "network interface names must not be empty".to_string(),
            ));
        }
        Ok(())
    }

    /// Out-of-range values (only possible before `validate`) fall back to the default.
    pub fn interval(&self) -> Duration {
        Duration::try_from_secs_f64(self.interval_secs)
            .unwrap_or_else(|_| Duration::from_secs_f64(DEFAULT_INTERVAL_SECS))
    }

    pub fn detector(&self) -> DetectorConfig {
        DetectorConfig {
            anomaly_threshold_ma: self.anomaly_threshold_ma,
            suspicion_limit: self.suspicion_limit,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let c = MonitorConfig::default();
        c.validate().unwrap();
        assert_eq!(c.interval(), Duration::from_secs(2));
        assert_eq!(c.detector(), DetectorConfig::default());
    }

    #[test]
    fn partial_file_keeps_defaults() {
        let c = MonitorConfig::from_json(
            r#"{"suspicion_limit": 3, "sensors": {"cell_interface": "rmnet_data0"}}"#,
        )
        .unwrap();
        assert_eq!(c.suspicion_limit, 3);
        assert_eq!(c.anomaly_threshold_ma, DEFAULT_ANOMALY_THRESHOLD_MA);
        assert_eq!(c.sensors.cell_interface, "rmnet_data0");
        assert_eq!(c.sensors.wifi_interface, "wlan0");
    }

    #[test]
    fn rejects_zero_limit_and_bad_interval() {
        let c = MonitorConfig {
            suspicion_limit: 0,
            ..MonitorConfig::default()
        };
        assert!(matches!(c.validate(), Err(ConfigError::Invalid(_))));

        for interval_secs in [0.0, -1.0, f64::NAN, f64::INFINITY, 1e30, MAX_INTERVAL_SECS + 1.0] {
            let c = MonitorConfig {
                interval_secs,
                ..MonitorConfig::default()
            };
            assert!(c.validate().is_err(), "{interval_secs}");
        }
    }

    #[test]
    fn huge_interval_is_rejected_not_panicking() {
        let c = MonitorConfig {
            interval_secs: 1e30,
            ..MonitorConfig::default()
        };
        assert!(matches!(c.validate(), Err(ConfigError::Invalid(_))));
        assert_eq!(c.interval(), Duration::from_secs(2));

        let c = MonitorConfig {
            interval_secs: MAX_INTERVAL_SECS,
            ..MonitorConfig::default()
        };
        c.validate().unwrap();
        assert_eq!(c.interval(), Duration::from_secs(86_400));
    }

    #[test]
    fn rejects_negative_threshold() {
        let c = MonitorConfig {
            anomaly_threshold_ma: -1.0,
            ..MonitorConfig::default()
        };
        assert!(c.validate().is_err());
    }

    #[test]
    fn load_round_trips_through_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("wattwatch.json");
        let original = MonitorConfig {
            interval_secs: 1.0,
            ..MonitorConfig::default()
        };
        std::fs::write(&path, serde_json::to_string_pretty(&original).unwrap()).unwrap();
        assert_eq!(MonitorConfig::load(&path).unwrap(), original);
    }

    #[test]
    fn unknown_type_is_parse_error() {
        assert!(matches!(
            MonitorConfig::from_json(r#"{"suspicion_limit": "five"}"#),
            Err(ConfigError::Parse(_))
        ));
    }
}
