//! `wattwatch probe`: one-shot sensor readout.

use std::path::Path;

use wattwatch_core::SensorError;
use wattwatch_core::SysfsSensors;
use wattwatch_core::delta::normalize_current_ma;
use wattwatch_core::sensor::average_cpu_frequency;

use super::{EXIT_OK, Overrides, resolve_config};

pub fn run(config_path: Option<&Path>) -> i32 {
    let config = match resolve_config(config_path, Overrides::default()) {
        Ok(c) => c,
        Err(code) => return code,
    };
    let sensors = SysfsSensors::new(config.sensors.clone());
    let paths = sensors.paths();
    let report = sensors.probe();

    println!("Sensors");
    println!(
        "  {:<16} {}",
        "battery_current",
        describe(&report.battery_current, |v| format!(
            "{v} raw -> {}mA",
            normalize_current_ma(v)
        ))
    );
    println!(
        "  {:<16} {}",
        "brightness",
        describe(&report.brightness, |v| v.to_string())
    );
    println!(
        "  {:<16} {}",
        "gpu_busy",
        describe(&report.gpu_busy, |v| format!("{v} ns"))
    );
    println!(
        "  {:<16} {}",
        format!("wifi ({})", paths.wifi_interface),
        describe(&report.wifi_bytes, |v| format!("{v} bytes"))
    );
    println!(
        "  {:<16} {}",
        format!("cell ({})", paths.cell_interface),
        describe(&report.cell_bytes, |v| format!("{v} bytes"))
    );

    println!();
    println!("CPU cores: {} discovered", report.cpu_freqs.len());
    let mut readings = Vec::with_capacity(report.cpu_freqs.len());
    for (path, value) in &report.cpu_freqs {
        println!("  {:<60} {}", path.display(), describe(value, |v| v.to_string()));
        readings.push(*value.as_ref().unwrap_or(&0));
    }
    println!("  average (online cores): {}", average_cpu_frequency(&readings));

    EXIT_OK
}

fn describe(result: &Result<i64, SensorError>, fmt: impl Fn(i64) -> String) -> String {
    match result {
        Ok(v) => fmt(*v),
        Err(SensorError::Missing(_)) => "absent".to_string(),
        Err(e) => format!("unreadable ({e})"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn describe_separates_absent_from_zero() {
        assert_eq!(describe(&Ok(0), |v| v.to_string()), "0");
        assert_eq!(
            describe(&Err(SensorError::Missing(PathBuf::from("/x"))), |v| v
                .to_string()),
            "absent"
        );
        let malformed = Err(SensorError::Malformed {
            path: PathBuf::from("/x"),
            content: "abc".to_string(),
        });
        assert!(describe(&malformed, |v| v.to_string()).starts_with("unreadable"));
    }
}
