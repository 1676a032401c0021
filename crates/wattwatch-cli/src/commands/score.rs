//! `wattwatch score`: evaluate the model on a hand-entered scenario.

use std::path::Path;

use wattwatch_core::{AnomalyDetector, DetectorConfig, FeatureVector, Observation, Predictor};

use super::{EXIT_OK, Overrides, load_model, resolve_config};

pub fn run(
    config_path: Option<&Path>,
    overrides: Overrides,
    features: FeatureVector,
    actual: Option<i64>,
) -> i32 {
    let config = match resolve_config(config_path, overrides) {
        Ok(c) => c,
        Err(code) => return code,
    };
    let model = match load_model(&config) {
        Ok(m) => m,
        Err(code) => return code,
    };

    let predicted = model.predict(&features);
    for (name, value) in FeatureVector::NAMES.iter().zip(features.to_array()) {
        println!("  {name:<14} {value}");
    }
    println!("Predicted drain: {predicted:.0}mA ({} model)", model.kind());

    if let Some(actual) = actual {
        let observation = Observation::new(actual, predicted, 0.0);
        println!("{}", judgement(&observation, config.anomaly_threshold_ma));
    }
    EXIT_OK
}

/// Single-shot verdict: a fresh detector with a limit of 1 alerts on the
/// first suspicious reading.
fn judgement(observation: &Observation, threshold: f64) -> String {
    let mut detector = AnomalyDetector::new(DetectorConfig {
        anomaly_threshold_ma: threshold,
        suspicion_limit: 1,
    });
    if detector.observe(observation).is_alert() {
        format!(
            "ALERT: drawing {:.0}mA more than expected (threshold {threshold}mA)",
            observation.diff
        )
    } else {
        format!("Looks normal: diff {:+.0}mA", observation.diff)
    }
}
