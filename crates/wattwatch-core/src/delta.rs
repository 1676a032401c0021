//! Rate and unit computation between two time-separated raw samples.
//!
//! Cumulative counters (GPU busy time, interface bytes) may go backwards on
//! driver reload or interface restart. Every rate is clamped so that a
//! decrease reads as "no activity" instead of negative throughput.

use serde::{Deserialize, Serialize};

use crate::sensor::{RawSample, average_cpu_frequency};

/// Minimum denominator for every rate, in seconds.
pub const MIN_TIME_DELTA_SECS: f64 = 1.0;

/// Raw current readings above this are taken to be microamps.
pub const MICROAMP_CUTOFF: i64 = 10_000;

const NANOS_PER_SEC: f64 = 1e9;
const BYTES_PER_KIB: f64 = 1024.0;

/// Predictor input. Field order is the contract with the trained artifact.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct FeatureVector {
    pub brightness: f64,
    pub avg_cpu_freq: f64,
    pub gpu_load_pct: f64,
    pub wifi_kbps: f64,
    pub cell_kbps: f64,
}

impl FeatureVector {
    pub const LEN: usize = 5;
    pub const NAMES: [&'static str; Self::LEN] = [
        "brightness",
        "avg_cpu_freq",
        "gpu_load",
        "wifi_kbps",
        "cell_kbps",
    ];

    /// `[brightness, avg_cpu_freq, gpu_load_pct, wifi_kbps, cell_kbps]`.
    pub fn to_array(&self) -> [f64; Self::LEN] {
        [
            self.brightness,
            self.avg_cpu_freq,
            self.gpu_load_pct,
            self.wifi_kbps,
            self.cell_kbps,
        ]
    }
}

/// The previous sample, kept only to difference against the next one.
#[derive(Debug, Clone, PartialEq)]
pub struct SampleWindow {
    previous: RawSample,
}

/// Output of one delta step.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Deltas {
    pub features: FeatureVector,
    pub current_ma: i64,
    pub time_delta: f64,
}

impl SampleWindow {
    pub fn new(initial: RawSample) -> Self {
        Self { previous: initial }
    }

    pub fn previous(&self) -> &RawSample {
        &self.previous
    }

    /// Difference `current` against the held sample, then hold `current`
    /// instead. Nothing older than `current` survives.
    pub fn advance(&mut self, current: RawSample) -> Deltas {
        let deltas = compute_deltas(&self.previous, &current);
        self.previous = current;
        deltas
    }
}

pub fn compute_deltas(prev: &RawSample, curr: &RawSample) -> Deltas {
    let dt = time_delta(prev.timestamp, curr.timestamp);
    let features = FeatureVector {
        brightness: curr.brightness as f64,
        avg_cpu_freq: average_cpu_frequency(&curr.cpu_freqs) as f64,
        gpu_load_pct: gpu_load_pct(prev.gpu_busy_counter, curr.gpu_busy_counter, dt),
        wifi_kbps: throughput_kbps(prev.wifi_bytes, curr.wifi_bytes, dt),
        cell_kbps: throughput_kbps(prev.cell_bytes, curr.cell_bytes, dt),
    };
    Deltas {
        features,
        current_ma: normalize_current_ma(curr.battery_current_raw),
        time_delta: dt,
    }
}

/// Elapsed seconds, floored at [`MIN_TIME_DELTA_SECS`].
///
/// Also absorbs backwards clock steps and NaN timestamps.
pub fn time_delta(prev_ts: f64, now: f64) -> f64 {
    let dt = now - prev_ts;
    if dt.is_nan() {
        return MIN_TIME_DELTA_SECS;
    }
    dt.max(MIN_TIME_DELTA_SECS)
}

/// Busy share of the interval in percent, clamped to `[0, 100]`.
pub fn gpu_load_pct(prev_busy_ns: i64, curr_busy_ns: i64, time_delta: f64) -> f64 {
    let busy_secs = (curr_busy_ns as f64 - prev_busy_ns as f64) / NANOS_PER_SEC;
    let pct = busy_secs / time_delta * 100.0;
    if pct.is_nan() {
        return 0.0;
    }
    pct.clamp(0.0, 100.0)
}

/// KiB per second, never negative.
pub fn throughput_kbps(prev_bytes: i64, curr_bytes: i64, time_delta: f64) -> f64 {
    let kbps = (curr_bytes as f64 - prev_bytes as f64) / BYTES_PER_KIB / time_delta;
    if kbps.is_nan() {
        return 0.0;
    }
    kbps.max(0.0)
}

/// Milliamps from a `current_now` reading of unknown unit.
pub fn normalize_current_ma(raw: i64) -> i64 {
    if raw > MICROAMP_CUTOFF {
        raw / 1000
    } else {
        raw
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(ts: f64, gpu: i64, wifi: i64, cell: i64) -> RawSample {
        RawSample {
            battery_current_raw: 450,
            brightness: 1200,
            cpu_freqs: vec![1_400_000, 0, 1_600_000],
            gpu_busy_counter: gpu,
            wifi_bytes: wifi,
            cell_bytes: cell,
            timestamp: ts,
        }
    }

    #[test]
    fn time_delta_is_floored() {
        assert_eq!(time_delta(100.0, 102.0), 2.0);
        assert_eq!(time_delta(100.0, 100.5), 1.0);
        assert_eq!(time_delta(100.0, 100.0), 1.0);
        assert_eq!(time_delta(100.0, 40.0), 1.0);
        assert_eq!(time_delta(f64::NAN, 40.0), 1.0);
    }

    #[test]
    fn gpu_load_scales_busy_time() {
        // 1s busy in a 2s window.
        assert!((gpu_load_pct(0, 1_000_000_000, 2.0) - 50.0).abs() < 1e-9);
    }

    #[test]
    fn gpu_load_clamps_both_ends() {
        assert_eq!(gpu_load_pct(0, 5_000_000_000, 1.0), 100.0);
        assert_eq!(gpu_load_pct(9_000_000_000, 1_000, 1.0), 0.0);
    }

    #[test]
    fn gpu_load_stays_in_range_over_a_sweep() {
        for prev in [0i64, 1, 500_000_000, i64::MAX / 2] {
            for curr in [0i64, 7, 999_999_999, 3_000_000_000, i64::MAX] {
                for dt in [1.0, 1.5, 2.0, 60.0] {
                    let v = gpu_load_pct(prev, curr, dt);
                    assert!((0.0..=100.0).contains(&v), "{prev} {curr} {dt} -> {v}");
                }
            }
        }
    }

    #[test]
    fn throughput_in_kib_per_second() {
        assert!((throughput_kbps(0, 4096, 2.0) - 2.0).abs() < 1e-9);
    }

    #[test]
    fn counter_reset_clamps_to_zero() {
        for (prev, curr) in [(10_000, 0), (1, 0), (i64::MAX, 5), (4096, 4095)] {
            assert_eq!(throughput_kbps(prev, curr, 1.0), 0.0);
            assert_eq!(gpu_load_pct(prev, curr, 1.0), 0.0);
        }
    }

    #[test]
    fn current_unit_cutoff() {
        assert_eq!(normalize_current_ma(15_000), 15);
        assert_eq!(normalize_current_ma(450), 450);
        assert_eq!(normalize_current_ma(10_000), 10_000);
        assert_eq!(normalize_current_ma(10_001), 10);
        assert_eq!(normalize_current_ma(-452_000), -452_000);
    }

    #[test]
    fn feature_order_is_fixed() {
        let fv = FeatureVector {
            brightness: 1.0,
            avg_cpu_freq: 2.0,
            gpu_load_pct: 3.0,
            wifi_kbps: 4.0,
            cell_kbps: 5.0,
        };
        assert_eq!(fv.to_array(), [1.0, 2.0, 3.0, 4.0, 5.0]);
        assert_eq!(FeatureVector::NAMES[2], "gpu_load");
    }

    #[test]
    fn advance_replaces_window() {
        let mut window = SampleWindow::new(sample(1000.0, 0, 0, 0));
        let d = window.advance(sample(1002.0, 1_000_000_000, 2048, 10_240));
        assert_eq!(d.time_delta, 2.0);
        assert!((d.features.gpu_load_pct - 50.0).abs() < 1e-9);
        assert!((d.features.wifi_kbps - 1.0).abs() < 1e-9);
        assert!((d.features.cell_kbps - 5.0).abs() < 1e-9);
        assert_eq!(d.features.avg_cpu_freq, 1_500_000.0);
        assert_eq!(d.features.brightness, 1200.0);
        assert_eq!(d.current_ma, 450);
        assert_eq!(window.previous().timestamp, 1002.0);

        // Interface restart: counters drop back to zero.
        let d = window.advance(sample(1003.0, 1_000_000_000, 0, 0));
        assert_eq!(d.features.wifi_kbps, 0.0);
        assert_eq!(d.features.cell_kbps, 0.0);
        assert_eq!(d.features.gpu_load_pct, 0.0);
        assert_eq!(window.previous().wifi_bytes, 0);
    }
}
