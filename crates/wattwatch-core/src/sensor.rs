//! Raw counter reads from OS-exposed sysfs files.
//!
//! Every read is independent and failure-tolerant. Each accessor comes in two
//! flavours:
//! - `try_*` returns a [`SensorError`] so callers (and tests) can tell an
//!   absent sensor apart from one that genuinely reports zero,
//! - the plain form collapses any failure to `0`, which is what the delta
//!   pipeline consumes. An unreadable sensor is "no signal", never a halt.

use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Why a single sensor read produced no value.
#[derive(Debug, thiserror::Error)]
pub enum SensorError {
    #[error("sensor path {0} does not exist")]
    Missing(PathBuf),
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("unparseable content in {path}: {content:?}")]
    Malformed { path: PathBuf, content: String },
}

// ---------------------------------------------------------------------------
// Sensor paths
// ---------------------------------------------------------------------------

/// Where each signal lives on the device.
///
/// Defaults match a MediaTek Android handset (GED GPU counter, `ccmni1`
/// cellular interface).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SensorPaths {
    /// Instantaneous battery current (`current_now`), mA or µA.
    pub battery_current: PathBuf,
    /// Backlight brightness level.
    pub brightness: PathBuf,
    /// One-line GPU status file; second token is cumulative busy nanoseconds.
    pub gpu_busy: PathBuf,
    /// Directory holding `cpuN/cpufreq/scaling_cur_freq`.
    pub cpu_root: PathBuf,
    /// Directory holding `<iface>/statistics/{rx,tx}_bytes`.
    pub net_root: PathBuf,
    pub wifi_interface: String,
    pub cell_interface: String,
}

impl Default for SensorPaths {
    fn default() -> Self {
        Self {
            battery_current: PathBuf::from("/sys/class/power_supply/battery/current_now"),
            brightness: PathBuf::from("/sys/class/leds/lcd-backlight/brightness"),
            gpu_busy: PathBuf::from("/sys/kernel/ged/hal/gpu_sum_loading"),
            cpu_root: PathBuf::from("/sys/devices/system/cpu"),
            net_root: PathBuf::from("/sys/class/net"),
            wifi_interface: "wlan0".to_string(),
            cell_interface: "ccmni1".to_string(),
        }
    }
}

// ---------------------------------------------------------------------------
// Raw sample
// ---------------------------------------------------------------------------

/// One snapshot of every raw counter, produced fresh each cycle.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct RawSample {
    /// Battery current as reported (unit not yet normalized).
    pub battery_current_raw: i64,
    pub brightness: i64,
    /// Per-core current frequency, in discovery order.
    pub cpu_freqs: Vec<i64>,
    /// Cumulative GPU busy time in nanoseconds.
    pub gpu_busy_counter: i64,
    /// Cumulative Wi-Fi rx+tx bytes.
    pub wifi_bytes: i64,
    /// Cumulative cellular rx+tx bytes.
    pub cell_bytes: i64,
    /// Seconds since the Unix epoch.
    pub timestamp: f64,
}

/// Anything that can produce a [`RawSample`] once per cycle.
pub trait SensorSource {
    fn sample(&mut self) -> RawSample;
}

// ---------------------------------------------------------------------------
// Primitive reads
// ---------------------------------------------------------------------------

/// Read and parse a single integer from a counter file.
pub fn try_read_counter(path: &Path) -> Result<i64, SensorError> {
    let raw = std::fs::read_to_string(path).map_err(|source| {
        if source.kind() == std::io::ErrorKind::NotFound {
            SensorError::Missing(path.to_path_buf())
        } else {
            SensorError::Io {
                path: path.to_path_buf(),
                source,
            }
        }
    })?;
    let trimmed = raw.trim();
    trimmed.parse::<i64>().map_err(|_| SensorError::Malformed {
        path: path.to_path_buf(),
        content: trimmed.to_string(),
    })
}

/// Read a counter, `0` on any failure.
pub fn read_counter(path: &Path) -> i64 {
    or_zero(try_read_counter(path))
}

fn or_zero(result: Result<i64, SensorError>) -> i64 {
    match result {
        Ok(v) => v,
        Err(e) => {
            log::debug!("sensor fallback to 0: {e}");
            0
        }
    }
}

/// Mean of the strictly positive readings, truncated; `0` when none are positive.
pub fn average_cpu_frequency(readings: &[i64]) -> i64 {
    let (total, count) = readings
        .iter()
        .filter(|&&v| v > 0)
        .fold((0i128, 0i128), |(sum, n), &v| (sum + i128::from(v), n + 1));
    if count == 0 {
        0
    } else {
        (total / count) as i64
    }
}

/// Read every core and average the positive readings.
pub fn read_average_cpu_frequency(paths: &[PathBuf]) -> i64 {
    let readings: Vec<i64> = paths.iter().map(|p| read_counter(p)).collect();
    average_cpu_frequency(&readings)
}

/// rx+tx cumulative bytes for `interface` under `net_root`.
///
/// A missing `rx_bytes` means the interface is down or absent (airplane
/// mode, no modem) and is reported as [`SensorError::Missing`].
pub fn try_read_interface_byte_count(net_root: &Path, interface: &str) -> Result<i64, SensorError> {
    let stats = net_root.join(interface).join("statistics");
    let rx_path = stats.join("rx_bytes");
    if !rx_path.exists() {
        return Err(SensorError::Missing(rx_path));
    }
    let rx = read_counter(&rx_path);
    let tx = read_counter(&stats.join("tx_bytes"));
    Ok(rx.saturating_add(tx))
}

pub fn read_interface_byte_count(net_root: &Path, interface: &str) -> i64 {
    or_zero(try_read_interface_byte_count(net_root, interface))
}

/// Parse the cumulative busy counter from the second whitespace token.
pub fn try_read_gpu_busy_counter(path: &Path) -> Result<i64, SensorError> {
    let raw = std::fs::read_to_string(path).map_err(|source| {
        if source.kind() == std::io::ErrorKind::NotFound {
            SensorError::Missing(path.to_path_buf())
        } else {
            SensorError::Io {
                path: path.to_path_buf(),
                source,
            }
        }
    })?;
    raw.split_whitespace()
        .nth(1)
        .and_then(|token| token.parse::<i64>().ok())
        .ok_or_else(|| SensorError::Malformed {
            path: path.to_path_buf(),
            content: raw.trim().to_string(),
        })
}

pub fn read_gpu_busy_counter(path: &Path) -> i64 {
    or_zero(try_read_gpu_busy_counter(path))
}

/// Find `cpuN/cpufreq/scaling_cur_freq` files under `cpu_root`, ordered by core id.
pub fn discover_cpu_freq_paths(cpu_root: &Path) -> Vec<PathBuf> {
    let Ok(entries) = std::fs::read_dir(cpu_root) else {
        return Vec::new();
    };
    let mut cores: Vec<(usize, PathBuf)> = Vec::new();
    for entry in entries.flatten() {
        let path = entry.path();
        let Some(name) = path.file_name().and_then(|s| s.to_str()) else {
            continue;
        };
        let Some(cpu_id) = name
            .strip_prefix("cpu")
            .and_then(|s| s.parse::<usize>().ok())
        else {
            continue;
        };
        let freq = path.join("cpufreq").join("scaling_cur_freq");
        if freq.is_file() {
            cores.push((cpu_id, freq));
        }
    }
    cores.sort_by_key(|(id, _)| *id);
    cores.into_iter().map(|(_, p)| p).collect()
}

pub(crate) fn unix_secs_now() -> f64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs_f64()
}

// ---------------------------------------------------------------------------
// Sysfs-backed reader
// ---------------------------------------------------------------------------

/// Per-source availability as seen by one probe.
#[derive(Debug)]
pub struct ProbeReport {
    pub battery_current: Result<i64, SensorError>,
    pub brightness: Result<i64, SensorError>,
    pub gpu_busy: Result<i64, SensorError>,
    pub cpu_freqs: Vec<(PathBuf, Result<i64, SensorError>)>,
    pub wifi_bytes: Result<i64, SensorError>,
    pub cell_bytes: Result<i64, SensorError>,
}

/// Reads the configured sysfs paths. CPU cores are discovered once.
pub struct SysfsSensors {
    paths: SensorPaths,
    cpu_freq_paths: Vec<PathBuf>,
}

impl SysfsSensors {
    pub fn new(paths: SensorPaths) -> Self {
        let cpu_freq_paths = discover_cpu_freq_paths(&paths.cpu_root);
        log::info!(
            "discovered {} cpufreq cores under {}",
            cpu_freq_paths.len(),
            paths.cpu_root.display()
        );
        Self {
            paths,
            cpu_freq_paths,
        }
    }

    pub fn paths(&self) -> &SensorPaths {
        &self.paths
    }

    pub fn cpu_freq_paths(&self) -> &[PathBuf] {
        &self.cpu_freq_paths
    }

    /// Read every source without collapsing failures.
    pub fn probe(&self) -> ProbeReport {
        ProbeReport {
            battery_current: try_read_counter(&self.paths.battery_current),
            brightness: try_read_counter(&self.paths.brightness),
            gpu_busy: try_read_gpu_busy_counter(&self.paths.gpu_busy),
            cpu_freqs: self
                .cpu_freq_paths
                .iter()
                .map(|p| (p.clone(), try_read_counter(p)))
                .collect(),
            wifi_bytes: try_read_interface_byte_count(
                &self.paths.net_root,
                &self.paths.wifi_interface,
            ),
            cell_bytes: try_read_interface_byte_count(
                &self.paths.net_root,
                &self.paths.cell_interface,
            ),
        }
    }
}

impl SensorSource for SysfsSensors {
    fn sample(&mut self) -> RawSample {
        RawSample {
            battery_current_raw: read_counter(&self.paths.battery_current),
            brightness: read_counter(&self.paths.brightness),
            cpu_freqs: self.cpu_freq_paths.iter().map(|p| read_counter(p)).collect(),
            gpu_busy_counter: read_gpu_busy_counter(&self.paths.gpu_busy),
            wifi_bytes: read_interface_byte_count(&self.paths.net_root, &self.paths.wifi_interface),
            cell_bytes: read_interface_byte_count(&self.paths.net_root, &self.paths.cell_interface),
            timestamp: unix_secs_now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn write(path: &Path, content: &str) {
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, content).unwrap();
    }

    #[test]
    fn counter_parses_trimmed_integer() {
        let dir = tempfile::tempdir().unwrap();
        let p = dir.path().join("current_now");
        write(&p, " -452000\n");
        assert_eq!(try_read_counter(&p).unwrap(), -452_000);
        assert_eq!(read_counter(&p), -452_000);
    }

    #[test]
    fn missing_counter_is_distinguishable_but_reads_zero() {
        let dir = tempfile::tempdir().unwrap();
        let p = dir.path().join("nope");
        assert!(matches!(try_read_counter(&p), Err(SensorError::Missing(_))));
        assert_eq!(read_counter(&p), 0);
    }

    #[test]
    fn zero_reading_is_not_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let p = dir.path().join("brightness");
        write(&p, "0\n");
        assert_eq!(try_read_counter(&p).unwrap(), 0);
    }

    #[test]
    fn malformed_counter_reads_zero() {
        let dir = tempfile::tempdir().unwrap();
        let p = dir.path().join("brightness");
        write(&p, "bright\n");
        assert!(matches!(
            try_read_counter(&p),
            Err(SensorError::Malformed { .. })
        ));
        assert_eq!(read_counter(&p), 0);
    }

    #[test]
    fn cpu_average_ignores_offline_cores() {
        assert_eq!(average_cpu_frequency(&[1_000_000, 0, 2_000_000, -1]), 1_500_000);
        assert_eq!(average_cpu_frequency(&[1, 2]), 1);
        assert_eq!(average_cpu_frequency(&[0, 0]), 0);
        assert_eq!(average_cpu_frequency(&[]), 0);
    }

    #[test]
    fn cpu_discovery_orders_by_core_id() {
        let dir = tempfile::tempdir().unwrap();
        for (id, khz) in [(10, "300"), (2, "200"), (0, "100")] {
            write(
                &dir.path().join(format!("cpu{id}/cpufreq/scaling_cur_freq")),
                khz,
            );
        }
        fs::create_dir_all(dir.path().join("cpufreq")).unwrap();
        fs::create_dir_all(dir.path().join("cpu3")).unwrap();

        let paths = discover_cpu_freq_paths(dir.path());
        assert_eq!(paths.len(), 3);
        assert!(paths[0].starts_with(dir.path().join("cpu0")));
        assert!(paths[2].starts_with(dir.path().join("cpu10")));
        assert_eq!(read_average_cpu_frequency(&paths), 200);
    }

    #[test]
    fn interface_bytes_sum_rx_tx() {
        let dir = tempfile::tempdir().unwrap();
        write(&dir.path().join("wlan0/statistics/rx_bytes"), "1000\n");
        write(&dir.path().join("wlan0/statistics/tx_bytes"), "24\n");
        assert_eq!(read_interface_byte_count(dir.path(), "wlan0"), 1024);
    }

    #[test]
    fn absent_interface_reads_zero() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            try_read_interface_byte_count(dir.path(), "ccmni1"),
            Err(SensorError::Missing(_))
        ));
        assert_eq!(read_interface_byte_count(dir.path(), "ccmni1"), 0);
    }

    #[test]
    fn gpu_counter_uses_second_token() {
        let dir = tempfile::tempdir().unwrap();
        let p = dir.path().join("gpu_sum_loading");
        write(&p, "37 123456789 0\n");
        assert_eq!(read_gpu_busy_counter(&p), 123_456_789);

        write(&p, "37\n");
        assert!(matches!(
            try_read_gpu_busy_counter(&p),
            Err(SensorError::Malformed { .. })
        ));
        assert_eq!(read_gpu_busy_counter(&p), 0);
    }
}
