//! `wattwatch record`: append telemetry rows to a CSV training log.

use std::io::Write;
use std::path::Path;

use wattwatch_core::{Sampler, SysfsSensors, TelemetryLog, TelemetryRow};

use super::{EXIT_FAILURE, EXIT_OK, Overrides, install_stop_handler, resolve_config};

pub fn run(
    config_path: Option<&Path>,
    overrides: Overrides,
    output: &Path,
    max_rows: Option<u64>,
) -> i32 {
    let config = match resolve_config(config_path, overrides) {
        Ok(c) => c,
        Err(code) => return code,
    };
    let mut log = match TelemetryLog::open(output) {
        Ok(l) => l,
        Err(e) => {
            eprintln!("Error opening {}: {e}", output.display());
            return EXIT_FAILURE;
        }
    };
    let stop = match install_stop_handler() {
        Ok(s) => s,
        Err(code) => return code,
    };

    let sensors = SysfsSensors::new(config.sensors.clone());
    println!("Recording telemetry");
    println!("  Battery:   {}", config.sensors.battery_current.display());
    println!("  GPU:       {}", config.sensors.gpu_busy.display());
    println!(
        "  WiFi:      {} | Cell: {}",
        config.sensors.wifi_interface, config.sensors.cell_interface
    );
    println!("  CPU cores: {}", sensors.cpu_freq_paths().len());
    println!("  Interval:  {}s", config.interval_secs);
    println!("  Output:    {}", log.path().display());
    println!();

    let mut sampler = Sampler::new(sensors);
    let mut had_write_error = false;

    while stop.sleep(config.interval()) {
        let (deltas, timestamp) = sampler.next_deltas();
        let row = TelemetryRow::from_deltas(&deltas, timestamp);
        if let Err(e) = log.append(&row) {
            eprintln!("\nError writing row: {e}");
            had_write_error = true;
            break;
        }

        print!(
            "\rGPU:{:5.1}% | Wifi:{:5}K | Cell:{:5}K | I:{}mA   ",
            row.gpu_load, row.wifi_kbps, row.cell_kbps, row.current_ma
        );
        let _ = std::io::stdout().flush();

        if max_rows.is_some_and(|max| log.rows() >= max) {
            break;
        }
    }

    println!();
    println!("[!] Stopped. {} rows written to {}", log.rows(), log.path().display());
    if had_write_error { EXIT_FAILURE } else { EXIT_OK }
}
