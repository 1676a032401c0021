//! # wattwatch-core
//!
//! **The battery doesn't lie.**
//!
//! `wattwatch-core` compares a phone's measured battery current against the
//! current a trained model expects from visible activity (screen brightness,
//! CPU frequency, GPU load, Wi-Fi and cellular throughput). Draw that stays
//! well above the expectation for several cycles in a row points at hidden
//! background work, and raises an alert.
//!
//! ## Quick Start
//!
//! ```no_run
//! use std::path::Path;
//! use wattwatch_core::{ConsoleSink, ModelArtifact, Monitor, MonitorConfig, StopSignal, SysfsSensors};
//!
//! let config = MonitorConfig::default();
//! let model = ModelArtifact::load(Path::new("watt_model.json")).expect("model");
//! let sensors = SysfsSensors::new(config.sensors.clone());
//! let mut monitor = Monitor::new(sensors, model, config.detector(), config.interval())
//!     .with_sink(ConsoleSink);
//!
//! let stop = StopSignal::new();
//! monitor.run(&stop, |report| println!("{:?}", report.verdict));
//! ```
//!
//! ## Architecture
//!
//! Sensors → SampleWindow (deltas) → Predictor → AnomalyDetector → AlertSinks
//!
//! - [`sensor`] reads sysfs counters, collapsing failures to zero.
//! - [`delta`] turns two samples into rates, clamping counter resets.
//! - [`predictor`] is the boundary to the trained scoring function.
//! - [`detector`] is the hysteresis state machine.
//! - [`monitor`] drives one cycle per interval until stopped.
//! - [`recorder`] writes the CSV log that training data is collected from.

pub mod alert;
pub mod config;
pub mod delta;
pub mod detector;
pub mod monitor;
pub mod predictor;
pub mod recorder;
pub mod sensor;

pub use alert::{AlertSink, ConsoleSink, TermuxSink, alert_message};
pub use config::{ConfigError, MonitorConfig};
pub use delta::{Deltas, FeatureVector, SampleWindow, compute_deltas};
pub use detector::{AnomalyDetector, DetectorConfig, Observation, Verdict};
pub use monitor::{CycleReport, Monitor, Sampler, StopSignal};
pub use predictor::{ModelArtifact, Predictor, PredictorError};
pub use recorder::{TelemetryLog, TelemetryRow};
pub use sensor::{ProbeReport, RawSample, SensorError, SensorPaths, SensorSource, SysfsSensors};

/// Library version (from Cargo.toml).
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
