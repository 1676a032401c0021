//! Hysteresis anomaly detection over (actual, predicted) pairs.
//!
//! A cycle is suspicious when actual draw exceeds the prediction by strictly
//! more than the threshold. Consecutive suspicious cycles build up a counter;
//! a single normal cycle clears it. Once the counter reaches the limit every
//! further suspicious cycle alerts again, so a persistent drain keeps
//! signalling. A limit of 1 alerts on the first suspicious cycle.

use serde::{Deserialize, Serialize};

/// One cycle's actual-vs-predicted comparison.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Observation {
    pub actual_ma: i64,
    pub predicted_ma: f64,
    /// `actual_ma - predicted_ma`.
    pub diff: f64,
    pub timestamp: f64,
}

impl Observation {
    pub fn new(actual_ma: i64, predicted_ma: f64, timestamp: f64) -> Self {
        Self {
            actual_ma,
            predicted_ma,
            diff: actual_ma as f64 - predicted_ma,
            timestamp,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DetectorConfig {
    /// mA by which actual must strictly exceed predicted.
    pub anomaly_threshold_ma: f64,
    /// Consecutive suspicious cycles before alerting; at least 1.
    pub suspicion_limit: u32,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            anomaly_threshold_ma: 350.0,
            suspicion_limit: 5,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    /// Within threshold; suspicion cleared.
    Normal,
    /// Over threshold, counter below the limit.
    Suspicious { count: u32 },
    /// Counter at or past the limit.
    Alert { count: u32 },
}

impl Verdict {
    pub fn is_alert(self) -> bool {
        matches!(self, Self::Alert { .. })
    }
}

#[derive(Debug, Clone)]
pub struct AnomalyDetector {
    config: DetectorConfig,
    suspicion_counter: u32,
}

impl AnomalyDetector {
    pub fn new(config: DetectorConfig) -> Self {
        Self {
            config: DetectorConfig {
                suspicion_limit: config.suspicion_limit.max(1),
                ..config
            },
            suspicion_counter: 0,
        }
    }

    pub fn config(&self) -> &DetectorConfig {
        &self.config
    }

    pub fn suspicion_counter(&self) -> u32 {
        self.suspicion_counter
    }

    pub fn observe(&mut self, observation: &Observation) -> Verdict {
        if observation.diff > self.config.anomaly_threshold_ma {
            self.suspicion_counter = self.suspicion_counter.saturating_add(1);
        } else {
            self.suspicion_counter = 0;
            return Verdict::Normal;
        }

        // No reset on alert: a persisting condition re-fires every cycle.
        if self.suspicion_counter >= self.config.suspicion_limit {
            Verdict::Alert {
                count: self.suspicion_counter,
            }
        } else {
            Verdict::Suspicious {
                count: self.suspicion_counter,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn detector(threshold: f64, limit: u32) -> AnomalyDetector {
        AnomalyDetector::new(DetectorConfig {
            anomaly_threshold_ma: threshold,
            suspicion_limit: limit,
        })
    }

    fn obs(diff: f64) -> Observation {
        Observation::new(1000, 1000.0 - diff, 0.0)
    }

    #[test]
    fn observation_diff_is_actual_minus_predicted() {
        let o = Observation::new(900, 420.5, 12.0);
        assert!((o.diff - 479.5).abs() < 1e-9);
    }

    #[test]
    fn equality_is_not_suspicious() {
        let mut d = detector(350.0, 5);
        assert_eq!(d.observe(&obs(351.0)), Verdict::Suspicious { count: 1 });
        assert_eq!(d.observe(&obs(350.0)), Verdict::Normal);
        assert_eq!(d.suspicion_counter(), 0);
    }

    #[test]
    fn alerts_on_fifth_cycle_and_repeats() {
        let mut d = detector(350.0, 5);
        for i in 1..=4 {
            let v = d.observe(&obs(400.0));
            assert_eq!(v, Verdict::Suspicious { count: i });
            assert!(!v.is_alert());
        }
        assert_eq!(d.observe(&obs(400.0)), Verdict::Alert { count: 5 });
        assert_eq!(d.observe(&obs(400.0)), Verdict::Alert { count: 6 });
    }

    #[test]
    fn one_normal_cycle_clears_suspicion() {
        let mut d = detector(350.0, 5);
        for _ in 0..4 {
            d.observe(&obs(400.0));
        }
        assert_eq!(d.suspicion_counter(), 4);
        assert_eq!(d.observe(&obs(100.0)), Verdict::Normal);
        assert_eq!(d.suspicion_counter(), 0);
        assert_eq!(d.observe(&obs(400.0)), Verdict::Suspicious { count: 1 });
    }

    #[test]
    fn limit_of_one_alerts_immediately() {
        let mut d = detector(350.0, 1);
        assert_eq!(d.observe(&obs(360.0)), Verdict::Alert { count: 1 });
        assert_eq!(d.observe(&obs(0.0)), Verdict::Normal);
        assert_eq!(d.observe(&obs(360.0)), Verdict::Alert { count: 1 });
    }

    #[test]
    fn zero_limit_behaves_as_one() {
        let mut d = detector(350.0, 0);
        assert_eq!(d.config().suspicion_limit, 1);
        assert!(d.observe(&obs(400.0)).is_alert());
    }

    #[test]
    fn negative_diff_is_normal() {
        let mut d = detector(0.0, 1);
        assert_eq!(d.observe(&obs(-50.0)), Verdict::Normal);
        assert_eq!(d.observe(&obs(0.0)), Verdict::Normal);
        assert!(d.observe(&obs(0.5)).is_alert());
    }

    #[test]
    fn nan_diff_clears_suspicion() {
        let mut d = detector(350.0, 2);
        d.observe(&obs(400.0));
        assert_eq!(d.observe(&obs(f64::NAN)), Verdict::Normal);
        assert_eq!(d.suspicion_counter(), 0);
    }
}
