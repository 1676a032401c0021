pub mod config;
pub mod probe;
pub mod record;
pub mod score;
pub mod watch;

use std::path::{Path, PathBuf};

use wattwatch_core::{ModelArtifact, MonitorConfig, StopSignal};

/// Clean exit, including Ctrl+C.
pub const EXIT_OK: i32 = 0;
/// Bad flags, bad config, or an I/O failure.
pub const EXIT_FAILURE: i32 = 1;
/// The scoring model could not be loaded; the sentinel cannot run without it.
pub const EXIT_PREDICTOR_UNAVAILABLE: i32 = 2;

/// Flag values that take precedence over the config file.
#[derive(Debug, Default)]
pub struct Overrides {
    pub model: Option<PathBuf>,
    pub interval: Option<f64>,
    pub threshold: Option<f64>,
    pub limit: Option<u32>,
}

impl Overrides {
    pub fn apply(self, config: &mut MonitorConfig) {
        if let Some(model) = self.model {
            config.model_path = model;
        }
        if let Some(interval) = self.interval {
            config.interval_secs = interval;
        }
        if let Some(threshold) = self.threshold {
            config.anomaly_threshold_ma = threshold;
        }
        if let Some(limit) = self.limit {
            config.suspicion_limit = limit;
        }
    }
}

/// File (or defaults) → flag overrides → validation.
pub fn resolve_config(path: Option<&Path>, overrides: Overrides) -> Result<MonitorConfig, i32> {
    let mut config = match path {
        Some(p) => MonitorConfig::load(p).map_err(|e| {
            eprintln!("Error: {e}");
            EXIT_FAILURE
        })?,
        None => MonitorConfig::default(),
    };
    overrides.apply(&mut config);
    config.validate().map_err(|e| {
        eprintln!("Error: {e}");
        EXIT_FAILURE
    })?;
    Ok(config)
}

/// Load the model or report why the sentinel can't start.
pub fn load_model(config: &MonitorConfig) -> Result<ModelArtifact, i32> {
    println!("[*] Loading model: {}", config.model_path.display());
    ModelArtifact::load(&config.model_path).map_err(|e| {
        eprintln!("[!] Error loading model: {e}");
        EXIT_PREDICTOR_UNAVAILABLE
    })
}

/// A stop signal wired to Ctrl+C.
pub fn install_stop_handler() -> Result<StopSignal, i32> {
    let stop = StopSignal::new();
    let handler = stop.clone();
    ctrlc::set_handler(move || handler.trigger()).map_err(|e| {
        eprintln!("Error setting Ctrl+C handler: {e}");
        EXIT_FAILURE
    })?;
    Ok(stop)
}
