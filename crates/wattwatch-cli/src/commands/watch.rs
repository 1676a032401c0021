//! `wattwatch watch`: the sentinel loop.

use std::io::Write;
use std::path::Path;

use wattwatch_core::{ConsoleSink, CycleReport, Monitor, SysfsSensors, TermuxSink, Verdict};

use super::{EXIT_OK, Overrides, install_stop_handler, load_model, resolve_config};

pub struct WatchOptions {
    pub termux: bool,
    pub cycles: Option<u64>,
    pub quiet: bool,
}

pub fn run(config_path: Option<&Path>, overrides: Overrides, opts: WatchOptions) -> i32 {
    let config = match resolve_config(config_path, overrides) {
        Ok(c) => c,
        Err(code) => return code,
    };
    let model = match load_model(&config) {
        Ok(m) => m,
        Err(code) => return code,
    };
    let stop = match install_stop_handler() {
        Ok(s) => s,
        Err(code) => return code,
    };

    let sensors = SysfsSensors::new(config.sensors.clone());
    let mut monitor = Monitor::new(sensors, model, config.detector(), config.interval())
        .with_sink(ConsoleSink);
    if opts.termux {
        monitor.add_sink(Box::new(TermuxSink::default()));
    }

    println!(
        "[*] Sentinel active. Threshold: +{}mA, {} consecutive checks",
        config.anomaly_threshold_ma, config.suspicion_limit
    );
    println!("[*] Press CTRL+C to stop.");

    let limit = opts.cycles;
    let counter_stop = stop.clone();
    let mut seen = 0u64;
    monitor.run(&stop, |report| {
        if !opts.quiet {
            print_status(report);
        }
        seen += 1;
        if limit.is_some_and(|max| seen >= max) {
            counter_stop.trigger();
        }
    });

    println!("\nSentinel deactivated.");
    EXIT_OK
}

/// `Act: 900mA | Exp: 420mA | Diff: +480mA | Suspicion: 2/5`
pub fn status_line(report: &CycleReport) -> String {
    let count = match report.verdict {
        Verdict::Normal => 0,
        Verdict::Suspicious { count } | Verdict::Alert { count } => count,
    };
    format!(
        "Act: {}mA | Exp: {:.0}mA | Diff: {:+.0}mA | Suspicion: {}/{}",
        report.observation.actual_ma,
        report.observation.predicted_ma,
        report.observation.diff,
        count,
        report.suspicion_limit
    )
}

fn print_status(report: &CycleReport) {
    let line = status_line(report);
    let mut out = std::io::stdout().lock();
    // Normal checks overwrite one line; suspicious ones scroll.
    let _ = match report.verdict {
        Verdict::Normal => write!(out, "\r\x1b[92m{line}\x1b[0m   "),
        _ => writeln!(out, "\r\x1b[93m{line}\x1b[0m"),
    };
    let _ = out.flush();
}

#[cfg(test)]
mod tests {
    use super::*;
    use wattwatch_core::{Deltas, FeatureVector, Observation};

    fn report(actual: i64, predicted: f64, verdict: Verdict) -> CycleReport {
        CycleReport {
            deltas: Deltas {
                features: FeatureVector::default(),
                current_ma: actual,
                time_delta: 2.0,
            },
            observation: Observation::new(actual, predicted, 0.0),
            verdict,
            suspicion_limit: 5,
        }
    }

    #[test]
    fn status_shows_signed_diff_and_count() {
        let r = report(900, 420.4, Verdict::Suspicious { count: 2 });
        assert_eq!(
            status_line(&r),
            "Act: 900mA | Exp: 420mA | Diff: +480mA | Suspicion: 2/5"
        );
    }

    #[test]
    fn status_for_normal_cycle_has_zero_count() {
        let r = report(300, 450.0, Verdict::Normal);
        assert_eq!(
            status_line(&r),
            "Act: 300mA | Exp: 450mA | Diff: -150mA | Suspicion: 0/5"
        );
    }
}
